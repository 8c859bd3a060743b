use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) if db.message().contains("duplicate key") => {
            RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            }
        }
        sqlx::Error::Database(db)
            if db.message().contains("violates foreign key constraint")
                || db.message().contains("invalid input syntax") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}

/// Appends one CSV record for `COPY ... WITH (FORMAT CSV, NULL '')`.
///
/// Every field is non-null: empty strings are written quoted so the server
/// does not read them as NULL.
pub(crate) fn append_csv_row<'a>(buffer: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            buffer.push(',');
        }
        first = false;
        append_csv_value(buffer, field);
    }
    buffer.push('\n');
}

fn append_csv_value(buffer: &mut String, value: &str) {
    if value.is_empty() {
        buffer.push_str("\"\"");
        return;
    }

    if value
        .bytes()
        .any(|b| matches!(b, b',' | b'"' | b'\n' | b'\r' | b'\\'))
    {
        buffer.push('"');
        for ch in value.chars() {
            if ch == '"' {
                buffer.push('"');
            }
            buffer.push(ch);
        }
        buffer.push('"');
    } else {
        buffer.push_str(value);
    }
}

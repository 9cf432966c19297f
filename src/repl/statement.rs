//! Parses one line of shell input into a `Statement`, rejecting malformed
//! or out-of-range rows before a `Record` is ever constructed.
use crate::errors::Error;
use crate::storage::record::{Record, EMAIL_MAX_LEN, USERNAME_MAX_LEN};

#[derive(Debug, PartialEq, Eq)]
pub enum Statement {
    Insert { id: u32, username: String, email: String },
    Select,
    Exit,
    Help,
    Tree,
}

/// Parses a raw input line. `.`-prefixed tokens are meta commands;
/// `insert`/`select` are the only recognized statements.
pub fn parse(line: &str) -> Result<Statement, Error> {
    let line = line.trim();
    if let Some(meta) = line.strip_prefix('.') {
        return match meta {
            "exit" | "quit" => Ok(Statement::Exit),
            "help" => Ok(Statement::Help),
            "tree" => Ok(Statement::Tree),
            other => Err(crate::err!(Syntax, "unrecognized meta command '.{}'", other)),
        };
    }

    let mut words = line.split_whitespace();
    match words.next() {
        Some("select") => Ok(Statement::Select),
        Some("insert") => parse_insert(words),
        Some(other) => Err(crate::err!(Syntax, "unrecognized keyword at start of '{}'", other)),
        None => Err(crate::err!(Syntax, "empty statement")),
    }
}

fn parse_insert<'a>(mut words: impl Iterator<Item = &'a str>) -> Result<Statement, Error> {
    let raw_id = words.next().ok_or_else(|| crate::err!(Syntax, "insert requires id, username, email"))?;
    let username = words.next().ok_or_else(|| crate::err!(Syntax, "insert requires id, username, email"))?;
    let email = words.next().ok_or_else(|| crate::err!(Syntax, "insert requires id, username, email"))?;
    if words.next().is_some() {
        return Err(crate::err!(Syntax, "insert takes exactly 3 arguments"));
    }

    let id: i64 = raw_id.parse().map_err(|_| crate::err!(Syntax, "'{}' is not a valid integer id", raw_id))?;
    if id < 0 {
        return Err(Error::NegativeId);
    }
    if id > u32::MAX as i64 {
        return Err(Error::IdTooBig);
    }
    if username.len() > USERNAME_MAX_LEN || email.len() > EMAIL_MAX_LEN {
        return Err(Error::StringTooLong);
    }

    Ok(Statement::Insert { id: id as u32, username: username.to_string(), email: email.to_string() })
}

pub fn record_for(id: u32, username: &str, email: &str) -> Result<Record, Error> {
    Record::new(id, username, email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_select() {
        assert_eq!(parse("select").unwrap(), Statement::Select);
    }

    #[test]
    fn parses_insert_with_three_fields() {
        let stmt = parse("insert 1 alice alice@example.com").unwrap();
        assert_eq!(
            stmt,
            Statement::Insert { id: 1, username: "alice".into(), email: "alice@example.com".into() }
        );
    }

    #[test]
    fn parses_meta_commands() {
        assert_eq!(parse(".exit").unwrap(), Statement::Exit);
        assert_eq!(parse(".quit").unwrap(), Statement::Exit);
        assert_eq!(parse(".help").unwrap(), Statement::Help);
        assert_eq!(parse(".tree").unwrap(), Statement::Tree);
    }

    #[test]
    fn rejects_negative_id() {
        assert!(matches!(parse("insert -1 a a@x"), Err(Error::NegativeId)));
    }

    #[test]
    fn rejects_id_too_big() {
        let line = format!("insert {} a a@x", u32::MAX as i64 + 1);
        assert!(matches!(parse(&line), Err(Error::IdTooBig)));
    }

    #[test]
    fn rejects_username_too_long() {
        let line = format!("insert 1 {} a@x", "a".repeat(USERNAME_MAX_LEN + 1));
        assert!(matches!(parse(&line), Err(Error::StringTooLong)));
    }

    #[test]
    fn rejects_wrong_argument_count() {
        assert!(matches!(parse("insert 1 a"), Err(Error::Syntax(_))));
        assert!(matches!(parse("insert 1 a b c"), Err(Error::Syntax(_))));
    }

    #[test]
    fn rejects_unknown_keyword() {
        assert!(matches!(parse("update 1 a b"), Err(Error::Syntax(_))));
    }
}

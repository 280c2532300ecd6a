//! Just enough SQL for the in-memory library: single-table CREATE/DROP,
//! INSERT, SELECT, UPDATE and DELETE with an optional `col = expr` filter.

use crate::native::type_code;
use crate::protocol::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Int(i128),
    Float(f64),
    Str(String),
    Question,
    Named(String),
    Punct(char),
}

fn tokenize(sql: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '\'' {
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err("unterminated string literal".to_string()),
                    Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                        text.push('\'');
                        i += 2;
                    }
                    Some('\'') => {
                        i += 1;
                        break;
                    }
                    Some(ch) => {
                        text.push(*ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(text));
        } else if c == '?' {
            tokens.push(Token::Question);
            i += 1;
        } else if c == ':' {
            let start = i + 1;
            i = start;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            if i == start {
                return Err("empty parameter name".to_string());
            }
            tokens.push(Token::Named(chars[start..i].iter().collect()));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let is_float = chars.get(i) == Some(&'.')
                && chars.get(i + 1).is_some_and(|ch| ch.is_ascii_digit());
            if is_float {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Float(text.parse().map_err(|_| "bad number")?));
            } else {
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Int(text.parse().map_err(|_| "bad number")?));
            }
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else {
            tokens.push(Token::Punct(c));
            i += 1;
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    /// Parameter marker; `None` for `?`, the name for `:name`.
    Param(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnSpec {
    pub name: String,
    pub type_code: i32,
    pub length: Option<usize>,
    pub primary_key: bool,
}

pub(crate) type Filter = Option<(String, Expr)>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Sql {
    CreateTable {
        name: String,
        columns: Vec<ColumnSpec>,
    },
    DropTable {
        name: String,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Expr>,
    },
    Select {
        table: String,
        columns: Option<Vec<String>>,
        filter: Filter,
    },
    Update {
        table: String,
        sets: Vec<(String, Expr)>,
        filter: Filter,
    },
    Delete {
        table: String,
        filter: Filter,
    },
}

/// True for statements the library executes immediately instead of preparing.
pub(crate) fn is_ddl(sql: &str) -> bool {
    let first = sql.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
    matches!(first.as_str(), "CREATE" | "DROP" | "ALTER" | "GRANT" | "REVOKE")
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), String> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(format!("expected {}", keyword))
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek() == Some(&Token::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), String> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(format!("expected '{}'", c))
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(format!("expected identifier, found {:?}", other)),
        }
    }

    fn ident_list(&mut self) -> Result<Vec<String>, String> {
        let mut names = vec![self.ident()?];
        while self.eat_punct(',') {
            names.push(self.ident()?);
        }
        Ok(names)
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let negative = self.eat_punct('-');
        let expr = match self.next() {
            Some(Token::Int(v)) => Expr::Literal(Value::Int(if negative { -v } else { v })),
            Some(Token::Float(v)) => Expr::Literal(Value::Double(if negative { -v } else { v })),
            Some(_) if negative => return Err("expected number after '-'".to_string()),
            Some(Token::Str(s)) => Expr::Literal(Value::Str(s)),
            Some(Token::Question) => Expr::Param(None),
            Some(Token::Named(name)) => Expr::Param(Some(name)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("null") => Expr::Literal(Value::Null),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("true") => Expr::Literal(Value::Bool(true)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("false") => Expr::Literal(Value::Bool(false)),
            other => return Err(format!("unsupported expression {:?}", other)),
        };
        Ok(expr)
    }

    fn filter(&mut self) -> Result<Filter, String> {
        if !self.eat_keyword("WHERE") {
            return Ok(None);
        }
        let column = self.ident()?;
        self.expect_punct('=')?;
        Ok(Some((column, self.expr()?)))
    }

    fn length(&mut self) -> Result<Option<usize>, String> {
        if !self.eat_punct('(') {
            return Ok(None);
        }
        let value = match self.next() {
            Some(Token::Int(v)) => usize::try_from(v).map_err(|_| "bad length")?,
            other => return Err(format!("expected length, found {:?}", other)),
        };
        let scale = match self.peek() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("k") => 1 << 10,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("m") => 1 << 20,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("g") => 1 << 30,
            _ => 1,
        };
        if scale > 1 {
            self.pos += 1;
        }
        // Scale part of DECIMAL(p, s) is accepted and ignored.
        if self.eat_punct(',') {
            self.next();
        }
        self.expect_punct(')')?;
        Ok(Some(value * scale))
    }

    fn column_type(&mut self) -> Result<(i32, Option<usize>), String> {
        let word = self.ident()?.to_ascii_uppercase();
        let code = match word.as_str() {
            "INTEGER" | "INT" => type_code::INTEGER,
            "SMALLINT" => type_code::SMALLINT,
            "BIGINT" => type_code::BIGINT,
            "REAL" => type_code::REAL,
            "DOUBLE" => {
                self.eat_keyword("PRECISION");
                type_code::DOUBLE
            }
            "FLOAT" => type_code::DOUBLE,
            "BOOLEAN" => type_code::BOOLEAN,
            "VARCHAR" => type_code::CHARACTER_VARYING,
            "CHAR" | "CHARACTER" => {
                if self.eat_keyword("VARYING") {
                    type_code::CHARACTER_VARYING
                } else {
                    type_code::CHARACTER
                }
            }
            "NVARCHAR" => type_code::NATIONAL_CHARACTER_VARYING,
            "NCHAR" => {
                if self.eat_keyword("VARYING") {
                    type_code::NATIONAL_CHARACTER_VARYING
                } else {
                    type_code::NATIONAL_CHARACTER
                }
            }
            "NATIONAL" => {
                if !self.eat_keyword("CHARACTER") {
                    self.expect_keyword("CHAR")?;
                }
                if self.eat_keyword("VARYING") {
                    type_code::NATIONAL_CHARACTER_VARYING
                } else {
                    type_code::NATIONAL_CHARACTER
                }
            }
            "BINARY" => {
                if self.eat_keyword("VARYING") {
                    type_code::BINARY_VARYING
                } else {
                    type_code::BINARY
                }
            }
            "VARBINARY" => type_code::BINARY_VARYING,
            "BLOB" => type_code::BLOB,
            "CLOB" => type_code::CLOB,
            "NCLOB" => type_code::NCLOB,
            other => return Err(format!("unsupported column type {}", other)),
        };
        Ok((code, self.length()?))
    }

    fn create_table(&mut self) -> Result<Sql, String> {
        self.expect_keyword("TABLE")?;
        let name = self.ident()?;
        self.expect_punct('(')?;
        let mut columns: Vec<ColumnSpec> = Vec::new();
        loop {
            if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                self.expect_punct('(')?;
                let key = self.ident()?;
                self.expect_punct(')')?;
                let column = columns
                    .iter_mut()
                    .find(|c| c.name.eq_ignore_ascii_case(&key))
                    .ok_or_else(|| format!("unknown key column {}", key))?;
                column.primary_key = true;
            } else {
                let column_name = self.ident()?;
                let (type_code, length) = self.column_type()?;
                let mut primary_key = false;
                loop {
                    if self.eat_keyword("PRIMARY") {
                        self.expect_keyword("KEY")?;
                        primary_key = true;
                    } else if self.eat_keyword("NOT") {
                        self.expect_keyword("NULL")?;
                    } else if !self.eat_keyword("NULL") {
                        break;
                    }
                }
                columns.push(ColumnSpec {
                    name: column_name,
                    type_code,
                    length,
                    primary_key,
                });
            }
            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_punct(')')?;
        if self.eat_keyword("IN") {
            self.ident()?;
        }
        Ok(Sql::CreateTable { name, columns })
    }

    fn statement(&mut self) -> Result<Sql, String> {
        let sql = if self.eat_keyword("CREATE") {
            self.create_table()?
        } else if self.eat_keyword("DROP") {
            self.expect_keyword("TABLE")?;
            let name = self.ident()?;
            if !self.eat_keyword("CASCADE") {
                self.eat_keyword("RESTRICT");
            }
            Sql::DropTable { name }
        } else if self.eat_keyword("INSERT") {
            self.expect_keyword("INTO")?;
            let table = self.ident()?;
            let columns = if self.eat_punct('(') {
                let names = self.ident_list()?;
                self.expect_punct(')')?;
                Some(names)
            } else {
                None
            };
            self.expect_keyword("VALUES")?;
            self.expect_punct('(')?;
            let mut values = vec![self.expr()?];
            while self.eat_punct(',') {
                values.push(self.expr()?);
            }
            self.expect_punct(')')?;
            Sql::Insert {
                table,
                columns,
                values,
            }
        } else if self.eat_keyword("SELECT") {
            let columns = if self.eat_punct('*') {
                None
            } else {
                Some(self.ident_list()?)
            };
            self.expect_keyword("FROM")?;
            let table = self.ident()?;
            let filter = self.filter()?;
            Sql::Select {
                table,
                columns,
                filter,
            }
        } else if self.eat_keyword("UPDATE") {
            let table = self.ident()?;
            self.expect_keyword("SET")?;
            let mut sets = Vec::new();
            loop {
                let column = self.ident()?;
                self.expect_punct('=')?;
                sets.push((column, self.expr()?));
                if !self.eat_punct(',') {
                    break;
                }
            }
            let filter = self.filter()?;
            Sql::Update { table, sets, filter }
        } else if self.eat_keyword("DELETE") {
            self.expect_keyword("FROM")?;
            let table = self.ident()?;
            let filter = self.filter()?;
            Sql::Delete { table, filter }
        } else {
            return Err("unsupported statement".to_string());
        };

        self.eat_punct(';');
        if self.pos < self.tokens.len() {
            return Err(format!("unexpected trailing input {:?}", self.peek()));
        }
        Ok(sql)
    }
}

pub(crate) fn parse(sql: &str) -> Result<Sql, String> {
    let mut parser = Parser {
        tokens: tokenize(sql)?,
        pos: 0,
    };
    parser.statement()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_with_key_and_schema_clause() {
        let sql = parse("create table t(c1 int primary key, c2 varchar(10) not null) in pybank")
            .expect("parse");
        match sql {
            Sql::CreateTable { name, columns } => {
                assert_eq!(name, "t");
                assert_eq!(columns.len(), 2);
                assert!(columns[0].primary_key);
                assert_eq!(columns[1].type_code, type_code::CHARACTER_VARYING);
                assert_eq!(columns[1].length, Some(10));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_table_level_key_and_lob_size() {
        let sql = parse("CREATE TABLE b (k INTEGER, data BLOB(2M), PRIMARY KEY (k))").expect("parse");
        match sql {
            Sql::CreateTable { columns, .. } => {
                assert!(columns[0].primary_key);
                assert_eq!(columns[1].length, Some(2 << 20));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert_with_markers() {
        let sql = parse("insert into t values (?, :name, -5, 'it''s', null)").expect("parse");
        assert_eq!(
            sql,
            Sql::Insert {
                table: "t".to_string(),
                columns: None,
                values: vec![
                    Expr::Param(None),
                    Expr::Param(Some("name".to_string())),
                    Expr::Literal(Value::Int(-5)),
                    Expr::Literal(Value::Str("it's".to_string())),
                    Expr::Literal(Value::Null),
                ],
            }
        );
    }

    #[test]
    fn test_parse_select_update_delete() {
        assert!(matches!(
            parse("select m from system.onerow"),
            Ok(Sql::Select { table, .. }) if table == "system.onerow"
        ));
        assert!(matches!(
            parse("UPDATE t SET int1 = 500 where int1 = 50"),
            Ok(Sql::Update { filter: Some(_), .. })
        ));
        assert!(matches!(parse("delete from t"), Ok(Sql::Delete { filter: None, .. })));
        assert!(parse("select from").is_err());
    }

    #[test]
    fn test_is_ddl() {
        assert!(is_ddl("  create table t(c1 int)"));
        assert!(is_ddl("DROP TABLE t CASCADE"));
        assert!(!is_ddl("select * from t"));
    }
}

/// Reader for the JavaScript literals Doxygen writes into its search-data files.
///
/// The files are plain declarations such as:
///
/// ```text
/// var searchData=
/// [
///   ['lock_5fguard_2611',['lock_guard',['https://.../lock_guard.html',1,'std']]],
/// ];
/// ```
///
/// Only the literal subset is supported: arrays, objects, single/double quoted
/// strings, numbers, `true`/`false`/`null`, trailing commas and comments. Values
/// come out as `serde_json::Value`.
use serde_json::{Map, Number, Value};

use crate::error::AppError;

const MAX_DEPTH: usize = 64;

/// Name of the declaration holding the record table in every section file.
pub const SEARCH_DATA_VAR: &str = "searchData";

/// Parse a single literal. Only whitespace, comments and `;` may follow it.
pub fn parse_value(src: &str) -> Result<Value, AppError> {
    let mut reader = Reader::new(src);
    reader.skip_trivia()?;
    let value = reader.value(0)?;
    reader.skip_trivia()?;
    reader.eat(';');
    reader.skip_trivia()?;
    if !reader.at_end() {
        return Err(reader.error("unexpected content after literal"));
    }
    Ok(value)
}

/// Parse every `var NAME = <literal>;` declaration in the source, in order.
///
/// `let` and `const` are accepted as well. Anything other than declarations,
/// whitespace and comments is a parse error.
pub fn parse_declarations(src: &str) -> Result<Vec<(String, Value)>, AppError> {
    let mut reader = Reader::new(src);
    let mut declarations = Vec::new();
    loop {
        reader.skip_trivia()?;
        if reader.at_end() {
            break;
        }
        let keyword = reader.identifier();
        if !matches!(keyword.as_str(), "var" | "let" | "const") {
            return Err(reader.error("expected a variable declaration"));
        }
        reader.skip_trivia()?;
        let name = reader.identifier();
        if name.is_empty() {
            return Err(reader.error("expected a variable name"));
        }
        reader.skip_trivia()?;
        if !reader.eat('=') {
            return Err(reader.error(&format!("expected '=' after `{name}`")));
        }
        reader.skip_trivia()?;
        let value = reader.value(0)?;
        reader.skip_trivia()?;
        reader.eat(';');
        declarations.push((name, value));
    }
    Ok(declarations)
}

/// Extract the records of the `searchData` array from a section file.
pub fn parse_search_data(src: &str) -> Result<Vec<Value>, AppError> {
    let declarations = parse_declarations(src)?;
    let value = declarations
        .into_iter()
        .find(|(name, _)| name == SEARCH_DATA_VAR)
        .map(|(_, value)| value)
        .ok_or_else(|| AppError::Parse {
            line: 1,
            message: format!("no `{SEARCH_DATA_VAR}` declaration found"),
        })?;
    match value {
        Value::Array(records) => Ok(records),
        other => Err(AppError::Parse {
            line: 1,
            message: format!("`{SEARCH_DATA_VAR}` is not an array (found {})", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        // A UTF-8 BOM is common in generated files.
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Self { src, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> AppError {
        let line = self.src[..self.pos].matches('\n').count() + 1;
        AppError::Parse {
            line,
            message: message.to_string(),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), AppError> {
        loop {
            let rest = self.rest();
            if let Some(c) = rest.chars().next().filter(|c| c.is_whitespace()) {
                self.pos += c.len_utf8();
            } else if rest.starts_with("//") {
                self.pos += rest.find('\n').unwrap_or(rest.len());
            } else if rest.starts_with("/*") {
                let end = rest[2..]
                    .find("*/")
                    .ok_or_else(|| self.error("unterminated block comment"))?;
                self.pos += end + 4;
            } else {
                return Ok(());
            }
        }
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let valid = if self.pos == start {
                c.is_alphabetic() || c == '_' || c == '$'
            } else {
                c.is_alphanumeric() || c == '_' || c == '$'
            };
            if !valid {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.src[start..self.pos].to_string()
    }

    fn value(&mut self, depth: usize) -> Result<Value, AppError> {
        if depth > MAX_DEPTH {
            return Err(self.error("literal nested too deeply"));
        }
        match self.peek() {
            Some('[') => self.array(depth),
            Some('{') => self.object(depth),
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                self.string(quote).map(Value::String)
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if c.is_alphabetic() => {
                let word = self.identifier();
                match word.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" | "undefined" => Ok(Value::Null),
                    _ => Err(self.error(&format!("unexpected identifier `{word}`"))),
                }
            }
            Some(c) => Err(self.error(&format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, AppError> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.eat(']') {
                return Ok(Value::Array(items));
            }
            items.push(self.value(depth + 1)?);
            self.skip_trivia()?;
            if self.eat(']') {
                return Ok(Value::Array(items));
            }
            if !self.eat(',') {
                return Err(self.error("expected ',' or ']' in array"));
            }
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, AppError> {
        self.bump();
        let mut map = Map::new();
        loop {
            self.skip_trivia()?;
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            let key = self.object_key()?;
            self.skip_trivia()?;
            if !self.eat(':') {
                return Err(self.error("expected ':' after object key"));
            }
            self.skip_trivia()?;
            let value = self.value(depth + 1)?;
            map.insert(key, value);
            self.skip_trivia()?;
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            if !self.eat(',') {
                return Err(self.error("expected ',' or '}' in object"));
            }
        }
    }

    fn object_key(&mut self) -> Result<String, AppError> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                self.string(quote)
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                Ok(self.src[start..self.pos].to_string())
            }
            _ => {
                let key = self.identifier();
                if key.is_empty() {
                    Err(self.error("expected object key"))
                } else {
                    Ok(key)
                }
            }
        }
    }

    /// Read a string body; the opening quote has already been consumed.
    fn string(&mut self, quote: char) -> Result<String, AppError> {
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or_else(|| self.error("unterminated string"))?;
            match c {
                c if c == quote => return Ok(out),
                '\n' => return Err(self.error("newline in string literal")),
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), AppError> {
        let c = self.bump().ok_or_else(|| self.error("unterminated escape"))?;
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(char::from_u32(code).ok_or_else(|| self.error("invalid \\x escape"))?);
            }
            'u' => {
                let code = self.hex_digits(4)?;
                let ch = if (0xD800..0xDC00).contains(&code) {
                    // High surrogate: a low surrogate escape must follow.
                    if !self.rest().starts_with("\\u") {
                        return Err(self.error("unpaired surrogate in \\u escape"));
                    }
                    self.pos += 2;
                    let low = self.hex_digits(4)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(self.error("invalid low surrogate in \\u escape"));
                    }
                    char::from_u32(0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00))
                } else {
                    char::from_u32(code)
                };
                out.push(ch.ok_or_else(|| self.error("invalid \\u escape"))?);
            }
            // Line continuation.
            '\n' => {}
            other => out.push(other),
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, AppError> {
        let digits = self
            .rest()
            .get(..count)
            .filter(|d| d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid hex escape"))?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos += count;
        Ok(code)
    }

    fn number(&mut self) -> Result<Value, AppError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some('-' | '+')) {
                        self.pos += 1;
                    }
                    continue;
                }
                _ => break,
            }
            self.pos += 1;
        }
        let text = self.src[start..self.pos].trim_start_matches('+');
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.error(&format!("invalid number `{text}`")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_nested_arrays_and_numbers() {
        let value = parse_value("['a', [1, -2, 3.5], [], true, null]").unwrap();
        assert_eq!(value, json!(["a", [1, -2, 3.5], [], true, null]));
    }

    #[test]
    fn parses_string_escapes() {
        let value = parse_value(r#"['it\'s', "say \"hi\"", 'a\\b', '\x41é', '😀']"#)
            .unwrap();
        assert_eq!(value, json!(["it's", "say \"hi\"", "a\\b", "Aé", "😀"]));
    }

    #[test]
    fn accepts_trailing_commas_and_comments() {
        let src = "[\n  // first\n  'a',\n  /* second */ 'b',\n];";
        assert_eq!(parse_value(src).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn parses_objects_with_numeric_and_identifier_keys() {
        let value = parse_value("{ 0: \"all\", 1: 'classes', name: 'x', 'q': 2, }").unwrap();
        assert_eq!(value, json!({"0": "all", "1": "classes", "name": "x", "q": 2}));
    }

    #[test]
    fn parses_declarations_in_order() {
        let src = "var a = [1];\nvar b =\n{\n  0: 'x'\n};\nconst c = 'y'";
        let decls = parse_declarations(src).unwrap();
        let names: Vec<&str> = decls.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(decls[1].1, json!({"0": "x"}));
    }

    #[test]
    fn extracts_search_data_records() {
        let src = "\u{feff}var searchData=\n[\n  ['lconv_2602',['lconv',['https://en.cppreference.com/w/cpp/locale/lconv.html',1,'std']]]\n];\n";
        let records = parse_search_data(src).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0][0], json!("lconv_2602"));
    }

    #[test]
    fn missing_search_data_is_a_parse_error() {
        let err = parse_search_data("var other = [];").unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }), "got {err:?}");

        let err = parse_search_data("var searchData = {};").unwrap_err();
        assert!(err.to_string().contains("not an array"), "got {err}");
    }

    #[test]
    fn reports_line_of_syntax_error() {
        let src = "var searchData=\n[\n  ['a' 'b']\n];";
        match parse_search_data(src).unwrap_err() {
            AppError::Parse { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("expected ',' or ']'"), "message: {message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unterminated_input() {
        assert!(parse_value("['abc").is_err());
        assert!(parse_value("[1, 2").is_err());
        assert!(parse_value("/* open").is_err());
        assert!(parse_value("[1] extra").is_err());
    }

    #[test]
    fn rejects_excessive_nesting() {
        let src = format!("{}{}", "[".repeat(MAX_DEPTH + 2), "]".repeat(MAX_DEPTH + 2));
        let err = parse_value(&src).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));
    }
}

//! Formula parser
//!
//! A recursive descent parser for spreadsheet formulas with proper operator
//! precedence. Sheet prefixes may be bare (`Data!A1`) or quoted
//! (`'Q1 Sales'!A1`), and ranges may name whole columns (`C:C`) or whole rows
//! (`2:5`).

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use sheetguard_core::{CellAddress, CellError, CellRange};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use sheetguard_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=AVERAGEIFS(C:C,B:B,\"Pro\")").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();

    let formula = formula
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;

    let mut parser = FormulaParser::new(formula);
    let expr = parser.parse_expression()?;

    match parser.current_token() {
        Token::Eof => Ok(expr),
        Token::Invalid(msg) => Err(FormulaError::Parse(msg.clone())),
        token => Err(FormulaError::Parse(format!(
            "Unexpected {} after expression",
            token.describe()
        ))),
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),

    // Identifiers and references
    Identifier(String), // Function name, bare name, or a column/row edge like "C" or "$3"
    CellRef(String),    // Cell reference like A1, $A$1
    SheetRef(String),   // Sheet prefix, already unquoted

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    /// Scanner failure, carrying the message
    Invalid(String),

    // End of input
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::String(s) => format!("string \"{}\"", s),
            Token::Boolean(b) => format!("boolean {}", if *b { "TRUE" } else { "FALSE" }),
            Token::Error(e) => format!("error {}", e),
            Token::Identifier(s) => format!("name '{}'", s),
            Token::CellRef(s) => format!("reference '{}'", s),
            Token::SheetRef(s) => format!("sheet prefix '{}!'", s),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Caret => "'^'".into(),
            Token::Percent => "'%'".into(),
            Token::Ampersand => "'&'".into(),
            Token::Equal => "'='".into(),
            Token::NotEqual => "'<>'".into(),
            Token::LessThan => "'<'".into(),
            Token::LessEqual => "'<='".into(),
            Token::GreaterThan => "'>'".into(),
            Token::GreaterEqual => "'>='".into(),
            Token::Colon => "':'".into(),
            Token::Comma => "','".into(),
            Token::Semicolon => "';'".into(),
            Token::LeftParen => "'('".into(),
            Token::RightParen => "')'".into(),
            Token::LeftBrace => "'{'".into(),
            Token::RightBrace => "'}'".into(),
            Token::Invalid(msg) => msg.clone(),
            Token::Eof => "end of formula".into(),
        }
    }
}

/// One end of a whole-column or whole-row range
enum RangeEdge {
    Column(String),
    Row(String),
}

impl RangeEdge {
    fn from_expr(expr: &FormulaExpr) -> Option<Self> {
        match expr {
            FormulaExpr::NameRef(name) => {
                let bare = name.trim_start_matches('$');
                if !bare.is_empty() && bare.len() <= 3 && bare.bytes().all(|b| b.is_ascii_alphabetic())
                {
                    Some(RangeEdge::Column(bare.to_string()))
                } else if !bare.is_empty() && bare.bytes().all(|b| b.is_ascii_digit()) {
                    Some(RangeEdge::Row(bare.to_string()))
                } else {
                    None
                }
            }
            FormulaExpr::Number(n) if n.fract() == 0.0 && *n >= 0.0 => {
                Some(RangeEdge::Row(format!("{}", *n as u64)))
            }
            _ => None,
        }
    }

    fn text(&self) -> &str {
        match self {
            RangeEdge::Column(s) | RangeEdge::Row(s) => s,
        }
    }
}

/// Map a core address error to a parser error.
///
/// Addresses that are well formed but outside the sheet grid are reference
/// errors, everything else is a syntax problem.
fn address_error(text: &str, err: sheetguard_core::Error) -> FormulaError {
    match err {
        sheetguard_core::Error::RowOutOfBounds(..)
        | sheetguard_core::Error::ColumnOutOfBounds(..) => {
            FormulaError::InvalidReference(format!("'{}': {}", text, err))
        }
        other => FormulaError::Parse(format!("Invalid reference '{}': {}", text, other)),
    }
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Option<Token>,
    depth: usize,
}

/// Deepest nesting of parentheses, calls and prefix operators accepted
pub const MAX_NESTING: usize = 100;

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: None,
            depth: 0,
        };
        parser.advance_token();
        parser
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        self.skip_whitespace();
        self.current_token = Some(self.scan_token());
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Token::Eof;
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return token;
        }

        // Two-character operators
        if c == '<' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::LessEqual;
            } else if self.peek_char() == Some('>') {
                self.advance();
                return Token::NotEqual;
            }
            return Token::LessThan;
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::GreaterEqual;
            }
            return Token::GreaterThan;
        }

        if c == '"' {
            return self.scan_string();
        }

        if c == '\'' {
            return self.scan_quoted_sheet();
        }

        if c.is_ascii_digit() || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        // Identifier, cell reference, or boolean/error
        if c.is_alphabetic() || c == '_' || c == '$' || c == '#' {
            return self.scan_identifier_or_ref();
        }

        self.advance();
        Token::Invalid(format!("Unexpected character '{}'", c))
    }

    fn scan_string(&mut self) -> Token {
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => return Token::Invalid("Unterminated string literal".into()),
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Token::String(s);
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    /// `'Sheet name'!` with `''` as an escaped quote
    fn scan_quoted_sheet(&mut self) -> Token {
        self.advance(); // opening quote

        let mut name = String::new();
        loop {
            match self.peek_char() {
                None => return Token::Invalid("Unterminated quoted sheet name".into()),
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
            }
        }

        if self.peek_char() != Some('!') {
            return Token::Invalid(format!("Expected '!' after sheet name '{}'", name));
        }
        self.advance();
        Token::SheetRef(name)
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num_str = &self.input[start..self.pos];
        match num_str.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Invalid(format!("Invalid number '{}'", num_str)),
        }
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        // Error literals (#VALUE!, #REF!, #GETTING_DATA, ...)
        if self.peek_char() == Some('#') {
            let start = self.pos;
            self.advance();
            while self.peek_char().map_or(false, |c| {
                c.is_ascii_alphanumeric() || matches!(c, '!' | '/' | '?' | '_')
            }) {
                self.advance();
            }
            let error_str = &self.input[start..self.pos];
            return match CellError::from_str(error_str) {
                Some(err) => Token::Error(err),
                None => Token::Invalid(format!("Unknown error literal '{}'", error_str)),
            };
        }

        let start = self.pos;

        while self.peek_char().map_or(false, |c| {
            c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
        }) {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        if self.peek_char() == Some('!') {
            self.advance();
            return Token::SheetRef(text.to_string());
        }

        // TRUE( / FALSE( are function calls
        let upper = text.to_uppercase();
        if upper == "TRUE" && self.peek_char() != Some('(') {
            return Token::Boolean(true);
        }
        if upper == "FALSE" && self.peek_char() != Some('(') {
            return Token::Boolean(false);
        }

        // LOG10( is a function even though "LOG10" looks like a cell
        if Self::is_cell_reference(text) && self.peek_char() != Some('(') {
            return Token::CellRef(text.to_string());
        }

        Token::Identifier(text.to_string())
    }

    /// `[$]letters[$]digits`
    fn is_cell_reference(text: &str) -> bool {
        let bytes = text.as_bytes();
        let mut i = 0;

        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }

        let letter_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        if i == letter_start {
            return false;
        }

        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }

        let digit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }

        i > digit_start && i == bytes.len()
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token();
        token
    }

    fn unexpected(&self, expected: &str) -> FormulaError {
        match self.current_token() {
            Token::Invalid(msg) => FormulaError::Parse(msg.clone()),
            token => FormulaError::Parse(format!(
                "Expected {}, got {}",
                expected,
                token.describe()
            )),
        }
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(self.unexpected(&expected.describe()))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^
    // 6. Unary: -, %
    // 7. Range: :
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_concatenation()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume();
            let right = self.parse_additive()?;
            left = Self::binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            let right = self.parse_exponent()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;

        if matches!(self.current_token(), Token::Caret) {
            self.consume();
            let right = self.nested(Self::parse_exponent)?; // right associative
            return Ok(Self::binary(BinaryOperator::Power, left, right));
        }

        Ok(left)
    }

    /// Run one level of recursive descent, refusing to go past `MAX_NESTING`
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> FormulaResult<T>) -> FormulaResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError::Parse(format!(
                "Formula nests more than {} levels deep",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        self.nested(Self::parse_prefixed)
    }

    fn parse_prefixed(&mut self) -> FormulaResult<FormulaExpr> {
        if matches!(self.current_token(), Token::Minus) {
            self.consume();
            let operand = self.parse_unary()?;
            return Ok(FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }

        if matches!(self.current_token(), Token::Plus) {
            self.consume();
            return self.parse_unary();
        }

        let mut expr = self.parse_range()?;

        while matches!(self.current_token(), Token::Percent) {
            self.consume();
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if !matches!(self.current_token(), Token::Colon) {
            return Ok(left);
        }
        self.consume();
        let right = self.parse_primary()?;

        match (&left, &right) {
            (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end)) => {
                // The end of `Data!A1:B5` carries no sheet of its own
                let sheet = match (&start.sheet, &end.sheet) {
                    (Some(s), Some(e)) if !s.eq_ignore_ascii_case(e) => {
                        return Err(FormulaError::Parse(
                            "Range references must be on the same sheet".into(),
                        ));
                    }
                    (s, e) => s.clone().or_else(|| e.clone()),
                };

                Ok(FormulaExpr::RangeRef(RangeReference {
                    sheet,
                    range: CellRange::new(start.address, end.address),
                }))
            }
            (FormulaExpr::CellRef(_), other) | (other, FormulaExpr::CellRef(_))
                if RangeEdge::from_expr(other).is_some() =>
            {
                Err(FormulaError::Parse(
                    "Range mixes a whole column or row with a single cell".into(),
                ))
            }
            _ => match (RangeEdge::from_expr(&left), RangeEdge::from_expr(&right)) {
                (Some(a), Some(b)) => self.whole_range(None, a, b),
                _ => Ok(Self::binary(BinaryOperator::Range, left, right)),
            },
        }
    }

    fn whole_range(
        &self,
        sheet: Option<String>,
        first: RangeEdge,
        last: RangeEdge,
    ) -> FormulaResult<FormulaExpr> {
        let text = format!("{}:{}", first.text(), last.text());
        let range = match (&first, &last) {
            (RangeEdge::Column(_), RangeEdge::Column(_)) | (RangeEdge::Row(_), RangeEdge::Row(_)) => {
                CellRange::parse(&text).map_err(|e| address_error(&text, e))?
            }
            _ => {
                return Err(FormulaError::Parse(format!(
                    "Range '{}' mixes a column with a row",
                    text
                )))
            }
        };
        Ok(FormulaExpr::RangeRef(RangeReference { sheet, range }))
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume();
                Ok(FormulaExpr::Number(n))
            }

            Token::String(s) => {
                self.consume();
                Ok(FormulaExpr::String(s))
            }

            Token::Boolean(b) => {
                self.consume();
                Ok(FormulaExpr::Boolean(b))
            }

            Token::Error(e) => {
                self.consume();
                Ok(FormulaExpr::Error(e))
            }

            Token::LeftParen => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBrace => self.parse_array(),

            Token::SheetRef(sheet) => {
                self.consume();
                self.parse_sheet_reference(sheet)
            }

            Token::CellRef(ref_str) => {
                self.consume();
                Self::parse_cell_reference(None, &ref_str)
            }

            Token::Identifier(name) => {
                self.consume();
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }

            _ => Err(self.unexpected("a value, reference, or function")),
        }
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftBrace)?;

        let mut rows = Vec::new();
        let mut current_row = Vec::new();

        if !matches!(self.current_token(), Token::RightBrace) {
            current_row.push(self.parse_expression()?);

            loop {
                match self.current_token() {
                    Token::Comma => {
                        self.consume();
                        current_row.push(self.parse_expression()?);
                    }
                    Token::Semicolon => {
                        self.consume();
                        rows.push(std::mem::take(&mut current_row));
                        current_row.push(self.parse_expression()?);
                    }
                    Token::RightBrace => break,
                    _ => return Err(self.unexpected("',' ';' or '}' in array")),
                }
            }
        }

        if !current_row.is_empty() {
            rows.push(current_row);
        }

        self.expect(&Token::RightBrace)?;
        Ok(FormulaExpr::Array(rows))
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();

        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_expression()?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }

    fn parse_sheet_reference(&mut self, sheet: String) -> FormulaResult<FormulaExpr> {
        match self.current_token().clone() {
            Token::CellRef(ref_str) => {
                self.consume();
                Self::parse_cell_reference(Some(sheet), &ref_str)
            }
            Token::Identifier(_) | Token::Number(_) => {
                // Data!C:C or Data!2:5
                let first = self.parse_primary()?;
                let first = RangeEdge::from_expr(&first)
                    .ok_or_else(|| self.unexpected("cell reference after sheet name"))?;
                self.expect(&Token::Colon)?;
                let last = self.parse_primary()?;
                let last = RangeEdge::from_expr(&last)
                    .ok_or_else(|| self.unexpected("column or row after ':'"))?;
                self.whole_range(Some(sheet), first, last)
            }
            _ => Err(self.unexpected("cell reference after sheet name")),
        }
    }

    fn parse_cell_reference(sheet: Option<String>, ref_str: &str) -> FormulaResult<FormulaExpr> {
        let col_absolute = ref_str.starts_with('$');
        let row_absolute = ref_str[1..].contains('$');
        let address = CellAddress::parse(&ref_str.replace('$', ""))
            .map_err(|e| address_error(ref_str, e))?;
        let address =
            CellAddress::with_absolute(address.row, address.col, row_absolute, col_absolute);

        Ok(FormulaExpr::CellRef(CellReference { sheet, address }))
    }
}

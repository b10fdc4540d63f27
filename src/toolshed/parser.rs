//! Rune cursor over a command expression
//!
//! Indices are byte offsets into the source and always sit on char
//! boundaries. A child context made by [`ParserContext::slice_block`] shares
//! the same `&str` and only narrows the readable range.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::completion::CompletionRequest;
use super::error::{ConError, ErrorKind, Span};
use super::value::ValueType;

/// Snapshot of a cursor position, see [`ParserContext::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePoint {
    index: usize,
    terminators: Vec<char>,
}

impl RestorePoint {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Parse state for one expression
#[derive(Debug, Clone)]
pub struct ParserContext<'a> {
    input: &'a str,
    expression: Arc<str>,
    index: usize,
    /// Exclusive upper bound of the readable range
    end: usize,
    terminators: Vec<char>,
    no_multiline: bool,
    generate_completions: bool,
    error: Option<ConError>,
    completions: Option<CompletionRequest>,
    variables: BTreeMap<String, ValueType>,
}

impl<'a> ParserContext<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            expression: Arc::from(input),
            index: 0,
            end: input.len(),
            terminators: Vec::new(),
            no_multiline: false,
            generate_completions: false,
            error: None,
            completions: None,
            variables: BTreeMap::new(),
        }
    }

    /// Treat a newline like `;` instead of whitespace
    pub fn no_multiline(mut self, enabled: bool) -> Self {
        self.no_multiline = enabled;
        self
    }

    /// Leave a [`CompletionRequest`] behind when the input runs out
    pub fn with_completions(mut self) -> Self {
        self.generate_completions = true;
        self
    }

    /// Variables known before parsing starts, used for `var` typing and `$` completion
    pub fn with_variables(mut self, vars: impl IntoIterator<Item = (String, ValueType)>) -> Self {
        self.variables.extend(vars);
        self
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    /// The whole source expression, shared with parsed runs and errors
    pub fn expression(&self) -> &Arc<str> {
        &self.expression
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generate_completions(&self) -> bool {
        self.generate_completions
    }

    pub fn is_no_multiline(&self) -> bool {
        self.no_multiline
    }

    pub fn out_of_input(&self) -> bool {
        self.index >= self.end
    }

    pub fn peek_rune(&self) -> Option<char> {
        self.input[self.index.min(self.end)..self.end].chars().next()
    }

    pub fn get_rune(&mut self) -> Option<char> {
        let c = self.peek_rune()?;
        self.index += c.len_utf8();
        Some(c)
    }

    pub fn eat_match(&mut self, c: char) -> bool {
        if self.peek_rune() != Some(c) {
            return false;
        }
        self.index += c.len_utf8();
        true
    }

    /// Consume `word` if it is the next whole whitespace-delimited word
    pub fn eat_match_str(&mut self, word: &str) -> bool {
        if self.peek_word(|c| !c.is_whitespace()) != Some(word) {
            return false;
        }
        self.get_word(|c| !c.is_whitespace());
        true
    }

    /// Skip whitespace, then take runes while `test` holds, without moving the cursor
    pub fn peek_word(&mut self, test: impl Fn(char) -> bool) -> Option<&'a str> {
        let start = self.index;
        let word = self.get_word(test);
        self.index = start;
        word
    }

    /// Skip whitespace, then take runes while `test` holds.
    ///
    /// Returns `None` if the cursor did not move. Whitespace alone moves it but
    /// yields no word.
    pub fn get_word(&mut self, test: impl Fn(char) -> bool) -> Option<&'a str> {
        let start = self.index;
        self.consume_whitespace();
        let word_start = self.index;
        self.consume(test);
        if self.index == start || self.index == word_start {
            return None;
        }
        Some(&self.input[word_start..self.index])
    }

    /// Advance while `control` holds and return the number of runes consumed
    pub fn consume(&mut self, control: impl Fn(char) -> bool) -> usize {
        let mut amount = 0;
        while let Some(c) = self.peek_rune() {
            if !control(c) {
                break;
            }
            self.index += c.len_utf8();
            amount += 1;
        }
        amount
    }

    pub fn consume_whitespace(&mut self) -> usize {
        if self.no_multiline {
            self.consume(|c| c.is_whitespace() && c != '\n')
        } else {
            self.consume(char::is_whitespace)
        }
    }

    pub fn push_block_terminator(&mut self, term: char) {
        self.terminators.push(term);
    }

    pub fn peek_block_terminator(&self) -> bool {
        match self.terminators.last() {
            Some(&term) => self.peek_rune() == Some(term),
            None => false,
        }
    }

    /// Consume the innermost pending terminator, popping it only on a match
    pub fn eat_block_terminator(&mut self) -> bool {
        let Some(&term) = self.terminators.last() else {
            return false;
        };
        if !self.eat_match(term) {
            return false;
        }
        self.terminators.pop();
        true
    }

    pub fn peek_command_or_block_terminated(&self) -> bool {
        match self.peek_rune() {
            Some(';' | '|') => true,
            Some('\n') if self.no_multiline => true,
            Some(c) => self.terminators.last() == Some(&c),
            None => false,
        }
    }

    fn eat_command_terminator(&mut self, piped: &mut Option<ValueType>) -> Option<bool> {
        if self.eat_match(';') {
            *piped = None;
            return Some(false);
        }

        let pipeable = piped.as_ref().is_some_and(|t| *t != ValueType::Void);
        if pipeable && self.eat_match('|') {
            return Some(true);
        }

        if self.no_multiline && self.eat_match('\n') {
            *piped = None;
            return Some(false);
        }

        None
    }

    /// Eat a run of command terminators.
    ///
    /// `;` drops the piped type, `|` keeps it and demands another command.
    /// Returns whether a command is now expected.
    pub fn eat_command_terminators(&mut self, piped: &mut Option<ValueType>) -> bool {
        let Some(mut expected) = self.eat_command_terminator(piped) else {
            return false;
        };

        self.consume_whitespace();
        while !expected {
            match self.eat_command_terminator(piped) {
                Some(e) => expected = e,
                None => break,
            }
            self.consume_whitespace();
        }
        expected
    }

    /// Scan a balanced `start`..`end` block and return a child context over it.
    ///
    /// The child starts after the opening delimiter and includes the closing
    /// one; this context moves past the block. Delimiters inside `"quoted"`
    /// strings don't count. Returns `None` with the cursor restored when the
    /// opening delimiter is missing or the block never closes.
    pub fn slice_block(&mut self, start: char, end: char) -> Option<ParserContext<'a>> {
        let checkpoint = self.save();
        self.consume_whitespace();

        if self.get_rune() != Some(start) {
            self.restore(&checkpoint);
            return None;
        }

        let block_start = self.index;
        let mut depth = 1usize;
        while depth > 0 {
            let closed = match self.get_rune() {
                Some(c) if c == start => {
                    depth += 1;
                    true
                }
                Some(c) if c == end => {
                    depth -= 1;
                    true
                }
                Some('"') => self.skip_quoted(),
                Some(_) => true,
                None => false,
            };
            if !closed {
                self.restore(&checkpoint);
                return None;
            }
        }

        Some(ParserContext {
            input: self.input,
            expression: Arc::clone(&self.expression),
            index: block_start,
            end: self.index.min(self.end),
            terminators: Vec::new(),
            no_multiline: self.no_multiline,
            generate_completions: self.generate_completions,
            error: None,
            completions: None,
            variables: self.variables.clone(),
        })
    }

    /// Move past the rest of a quoted string; `false` if it never ends
    fn skip_quoted(&mut self) -> bool {
        loop {
            match self.get_rune() {
                Some('"') => return true,
                Some('\\') => {
                    if self.get_rune().is_none() {
                        return false;
                    }
                }
                Some(_) => {}
                None => return false,
            }
        }
    }

    pub fn save(&self) -> RestorePoint {
        RestorePoint {
            index: self.index,
            terminators: self.terminators.clone(),
        }
    }

    pub fn restore(&mut self, point: &RestorePoint) {
        self.index = point.index;
        self.terminators.clone_from(&point.terminators);
    }

    pub fn error(&self) -> Option<&ConError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn take_error(&mut self) -> Option<ConError> {
        self.error.take()
    }

    /// Record an error. The first one wins; later ones are follow-on noise.
    pub fn set_error(&mut self, mut error: ConError) {
        if self.error.is_some() {
            return;
        }
        if error.expression.is_none() {
            error.expression = Some(Arc::clone(&self.expression));
        }
        tracing::debug!("parse error at {:?}: {}", error.span, error.kind);
        self.error = Some(error);
    }

    pub fn fail(&mut self, kind: ErrorKind, span: Span) {
        self.set_error(ConError::new(kind).with_span(span));
    }

    pub fn completions(&self) -> Option<&CompletionRequest> {
        self.completions.as_ref()
    }

    pub fn take_completions(&mut self) -> Option<CompletionRequest> {
        self.completions.take()
    }

    /// Offer completions, only while generating them
    pub fn set_completions(&mut self, request: CompletionRequest) {
        if self.generate_completions {
            self.completions = Some(request);
        }
    }

    pub fn variable_type(&self, name: &str) -> Option<&ValueType> {
        self.variables.get(name)
    }

    pub fn declare_variable(&mut self, name: &str, ty: ValueType) {
        self.variables.insert(name.to_string(), ty);
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &ValueType)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Hand a child context's side channels back to this one
    pub fn absorb(&mut self, child: &mut ParserContext<'a>) {
        if let Some(err) = child.take_error() {
            self.set_error(err);
        }
        if let Some(completions) = child.take_completions() {
            self.completions = Some(completions);
        }
    }
}

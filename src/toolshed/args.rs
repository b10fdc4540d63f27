//! Argument, literal and block parsers

use super::command::{ArgKind, ArgSpec, BlockInput, Toolshed};
use super::completion::CompletionRequest;
use super::error::{ErrorKind, Span};
use super::invocation::InvocationContext;
use super::parser::ParserContext;
use super::run::CommandRun;
use super::value::{Value, ValueType};

/// A parsed command run used as an argument
#[derive(Debug, Clone)]
pub struct Block {
    run: CommandRun,
}

impl Block {
    pub fn run(&self) -> &CommandRun {
        &self.run
    }

    pub fn return_type(&self) -> &ValueType {
        self.run.return_type()
    }

    /// Run the block, leaving any errors on `ctx`
    pub fn invoke(&self, input: Option<Value>, ctx: &mut dyn InvocationContext) -> Option<Value> {
        self.run.invoke_nested(input, ctx)
    }
}

/// Where a value argument comes from
#[derive(Debug, Clone)]
pub enum ValueRef {
    Literal(Value),
    /// `$name`, checked against `ty` when read
    Var { name: String, ty: ValueType },
    Block(Block),
}

#[derive(Debug, Clone)]
pub enum ParsedArg {
    Value(ValueRef),
    Block(Block),
    Var(String),
}

/// Runes allowed in a bare literal word
fn is_arg_token(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ';' | '|' | '{' | '}' | '[' | ']' | ',' | '"')
}

fn is_var_token(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Runes allowed in a type name, including the `list<..>` form
pub(crate) fn is_type_token(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '<' | '>')
}

/// Parse one argument described by `spec`
pub(crate) fn parse_arg(
    ctx: &mut ParserContext<'_>,
    shed: &Toolshed,
    command: &str,
    spec: &ArgSpec,
    piped: Option<&ValueType>,
) -> Option<ParsedArg> {
    ctx.consume_whitespace();
    let start = ctx.index();

    if ctx.out_of_input() && ctx.generate_completions() {
        let request = CompletionRequest::for_argument(spec, piped, ctx.variables());
        ctx.set_completions(request);
        ctx.fail(ErrorKind::OutOfInput, Span::new(start, start));
        return None;
    }

    if ctx.peek_command_or_block_terminated() || ctx.out_of_input() {
        ctx.fail(
            ErrorKind::ExpectedArgument {
                command: command.to_string(),
                name: spec.name.clone(),
                expected: spec.expected(),
            },
            Span::new(start, start + 1),
        );
        return None;
    }

    match &spec.kind {
        ArgKind::Value(ty) => parse_value_ref(ctx, shed, ty).map(ParsedArg::Value),
        ArgKind::Block { input, output } => {
            let block_piped = match input {
                BlockInput::Nothing => None,
                BlockInput::Piped => piped.cloned(),
                BlockInput::Element => Some(
                    piped
                        .and_then(ValueType::element)
                        .cloned()
                        .unwrap_or(ValueType::Any),
                ),
            };
            parse_block(ctx, shed, block_piped.as_ref(), output.as_ref()).map(ParsedArg::Block)
        }
        ArgKind::Assign => {
            let name = parse_var_name(ctx, None)?;
            let ty = piped.cloned().unwrap_or(ValueType::Any);
            ctx.declare_variable(&name, ty);
            Some(ParsedArg::Var(name))
        }
        ArgKind::Variable => parse_var_name(ctx, None).map(ParsedArg::Var),
    }
}

/// A literal, `$variable` or `{ block }` of type `ty`
fn parse_value_ref(
    ctx: &mut ParserContext<'_>,
    shed: &Toolshed,
    ty: &ValueType,
) -> Option<ValueRef> {
    match ctx.peek_rune() {
        Some('$') => {
            let name = parse_var_name(ctx, Some(ty))?;
            Some(ValueRef::Var {
                name,
                ty: ty.clone(),
            })
        }
        Some('{') => parse_block(ctx, shed, None, Some(ty)).map(ValueRef::Block),
        _ => parse_literal(ctx, ty).map(ValueRef::Literal),
    }
}

/// `$name`; offers variables assignable to `ty` as completions at the end of input
fn parse_var_name(ctx: &mut ParserContext<'_>, ty: Option<&ValueType>) -> Option<String> {
    ctx.consume_whitespace();
    let start = ctx.index();
    if !ctx.eat_match('$') {
        let input = ctx.peek_word(is_arg_token).unwrap_or_default().to_string();
        let end = start + input.len().max(1);
        ctx.fail(
            ErrorKind::ArgumentParse {
                input,
                expected: "$variable".to_string(),
            },
            Span::new(start, end),
        );
        return None;
    }

    let name_start = ctx.index();
    ctx.consume(is_var_token);
    let name = &ctx.input()[name_start..ctx.index()];

    if ctx.out_of_input() {
        let candidates = ctx
            .variables()
            .filter(|(_, t)| ty.is_none_or(|want| t.is_assignable_to(want)))
            .map(|(n, _)| format!("${}", n))
            .collect();
        ctx.set_completions(CompletionRequest::Variables {
            partial: format!("${}", name),
            candidates,
        });
    }

    if name.is_empty() {
        if ctx.out_of_input() {
            ctx.fail(ErrorKind::OutOfInput, Span::new(ctx.index(), ctx.index()));
        } else {
            ctx.fail(
                ErrorKind::ArgumentParse {
                    input: "$".to_string(),
                    expected: "$variable".to_string(),
                },
                Span::new(start, ctx.index() + 1),
            );
        }
        return None;
    }
    Some(name.to_string())
}

/// A `{ run }` block, or a single command when there is no opening brace
pub(crate) fn parse_block(
    ctx: &mut ParserContext<'_>,
    shed: &Toolshed,
    piped: Option<&ValueType>,
    target: Option<&ValueType>,
) -> Option<Block> {
    ctx.consume_whitespace();
    let start = ctx.index();

    if !ctx.eat_match('{') {
        return CommandRun::parse_once(ctx, shed, piped, target).map(|run| Block { run });
    }

    ctx.push_block_terminator('}');
    let run = CommandRun::parse(ctx, shed, piped, target)?;
    if !ctx.eat_block_terminator() {
        ctx.fail(ErrorKind::MissingClosingBrace, Span::new(start, ctx.index()));
        return None;
    }
    Some(Block { run })
}

fn parse_failed(ctx: &mut ParserContext<'_>, start: usize, input: &str, expected: &ValueType) {
    ctx.fail(
        ErrorKind::ArgumentParse {
            input: input.to_string(),
            expected: expected.to_string(),
        },
        Span::new(start, ctx.index().max(start + 1)),
    );
}

/// Parse a literal of type `ty`, recording an error on failure
pub fn parse_literal(ctx: &mut ParserContext<'_>, ty: &ValueType) -> Option<Value> {
    ctx.consume_whitespace();
    let start = ctx.index();

    match ty {
        ValueType::String => parse_string(ctx),
        ValueType::List(element) => parse_list(ctx, element),
        ValueType::Any => parse_any(ctx),
        ValueType::Void => {
            parse_failed(ctx, start, "", ty);
            None
        }
        ValueType::Int | ValueType::Float | ValueType::Bool => {
            let word = ctx.get_word(is_arg_token).unwrap_or_default();
            let value = match ty {
                ValueType::Int => word.parse().ok().map(Value::Int),
                ValueType::Float => word.parse().ok().map(Value::Float),
                _ => word.parse().ok().map(Value::Bool),
            };
            if value.is_none() {
                parse_failed(ctx, start, word, ty);
            }
            value
        }
    }
}

/// A quoted string with `\"`, `\\`, `\n` and `\t` escapes, or a bare word
fn parse_string(ctx: &mut ParserContext<'_>) -> Option<Value> {
    let start = ctx.index();
    if !ctx.eat_match('"') {
        return match ctx.get_word(is_arg_token) {
            Some(word) => Some(Value::String(word.to_string())),
            None => {
                parse_failed(ctx, start, "", &ValueType::String);
                None
            }
        };
    }

    let mut out = String::new();
    loop {
        match ctx.get_rune() {
            Some('"') => return Some(Value::String(out)),
            Some('\\') => match ctx.get_rune() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c) => out.push(c),
                None => break,
            },
            Some(c) => out.push(c),
            None => break,
        }
    }

    let input = ctx.input()[start..ctx.index()].to_string();
    parse_failed(ctx, start, &input, &ValueType::String);
    None
}

/// `[a, b, c]`, parsed in a child context bounded by the brackets
fn parse_list(ctx: &mut ParserContext<'_>, element: &ValueType) -> Option<Value> {
    let start = ctx.index();
    let list_ty = ValueType::list(element.clone());
    let Some(mut child) = ctx.slice_block('[', ']') else {
        let input = ctx.peek_word(is_arg_token).unwrap_or_default().to_string();
        parse_failed(ctx, start, &input, &list_ty);
        return None;
    };

    let mut items = Vec::new();
    loop {
        child.consume_whitespace();
        if child.eat_match(']') {
            break;
        }
        let Some(item) = parse_literal(&mut child, element) else {
            ctx.absorb(&mut child);
            return None;
        };
        items.push(item);
        child.consume_whitespace();
        if child.eat_match(',') {
            continue;
        }
        if child.eat_match(']') {
            break;
        }
        let at = child.index();
        let input = child.peek_word(is_arg_token).unwrap_or_default().to_string();
        child.fail(
            ErrorKind::ArgumentParse {
                input,
                expected: list_ty.to_string(),
            },
            Span::new(at, at + 1),
        );
        ctx.absorb(&mut child);
        return None;
    }
    Some(Value::List(items))
}

/// Infer the literal type: list, quoted string, int, float, bool, then bare string
fn parse_any(ctx: &mut ParserContext<'_>) -> Option<Value> {
    match ctx.peek_rune() {
        Some('[') => return parse_list(ctx, &ValueType::Any),
        Some('"') => return parse_string(ctx),
        _ => {}
    }

    let start = ctx.index();
    let Some(word) = ctx.get_word(is_arg_token) else {
        parse_failed(ctx, start, "", &ValueType::Any);
        return None;
    };
    let value = if let Ok(v) = word.parse::<i64>() {
        Value::Int(v)
    } else if let Ok(v) = word.parse::<f64>() {
        Value::Float(v)
    } else if let Ok(v) = word.parse::<bool>() {
        Value::Bool(v)
    } else {
        Value::String(word.to_string())
    };
    Some(value)
}

/// A type argument such as `int` or `list<string>`
pub(crate) fn parse_type(ctx: &mut ParserContext<'_>, command: &str) -> Option<ValueType> {
    ctx.consume_whitespace();
    let start = ctx.index();

    let Some(word) = ctx.get_word(is_type_token) else {
        if ctx.out_of_input() {
            ctx.set_completions(CompletionRequest::Types {
                partial: String::new(),
            });
        }
        ctx.fail(
            ErrorKind::ExpectedTypeArgument {
                command: command.to_string(),
            },
            Span::new(start, start + 1),
        );
        return None;
    };

    if ctx.out_of_input() {
        ctx.set_completions(CompletionRequest::Types {
            partial: word.to_string(),
        });
    }

    match word.parse() {
        Ok(ty) => Some(ty),
        Err(_) => {
            ctx.fail(
                ErrorKind::UnknownType {
                    name: word.to_string(),
                },
                Span::new(start, ctx.index()),
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(input: &str, ty: &ValueType) -> Result<Value, ErrorKind> {
        let mut ctx = ParserContext::new(input);
        parse_literal(&mut ctx, ty).ok_or_else(|| ctx.take_error().unwrap().kind)
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(literal(" 42", &ValueType::Int), Ok(Value::Int(42)));
        assert_eq!(literal("-3", &ValueType::Int), Ok(Value::Int(-3)));
        assert_eq!(literal("2.5", &ValueType::Float), Ok(Value::Float(2.5)));
        assert_eq!(literal("2", &ValueType::Float), Ok(Value::Float(2.0)));
        assert_eq!(literal("true", &ValueType::Bool), Ok(Value::Bool(true)));
        assert!(matches!(
            literal("two", &ValueType::Int),
            Err(ErrorKind::ArgumentParse { .. })
        ));
    }

    #[test]
    fn test_int_literal_stops_at_terminator() {
        let mut ctx = ParserContext::new("1;");
        assert_eq!(parse_literal(&mut ctx, &ValueType::Int), Some(Value::Int(1)));
        assert_eq!(ctx.peek_rune(), Some(';'));
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(literal("word rest", &ValueType::String), Ok(Value::from("word")));
        assert_eq!(
            literal(r#""a \"b\"\n""#, &ValueType::String),
            Ok(Value::from("a \"b\"\n"))
        );
        assert!(matches!(
            literal("\"open", &ValueType::String),
            Err(ErrorKind::ArgumentParse { .. })
        ));
    }

    #[test]
    fn test_list_literals() {
        let ints = ValueType::list(ValueType::Int);
        assert_eq!(literal("[1, 2, 3]", &ints), Ok(Value::from(vec![1i64, 2, 3])));
        assert_eq!(literal("[ ]", &ints), Ok(Value::List(vec![])));
        assert_eq!(
            literal("[[1], [2, 3]]", &ValueType::list(ints.clone())),
            Ok(Value::List(vec![
                Value::from(vec![1i64]),
                Value::from(vec![2i64, 3])
            ]))
        );
        assert!(matches!(literal("[1, x]", &ints), Err(ErrorKind::ArgumentParse { .. })));
        assert!(matches!(literal("[1 2]", &ints), Err(ErrorKind::ArgumentParse { .. })));
        assert!(matches!(literal("[1, 2", &ints), Err(ErrorKind::ArgumentParse { .. })));
    }

    #[test]
    fn test_list_error_span_is_absolute() {
        let mut ctx = ParserContext::new("[1, x]");
        assert!(parse_literal(&mut ctx, &ValueType::list(ValueType::Int)).is_none());
        assert_eq!(ctx.error().unwrap().span, Some(Span::new(4, 5)));
    }

    #[test]
    fn test_any_literals() {
        assert_eq!(literal("7", &ValueType::Any), Ok(Value::Int(7)));
        assert_eq!(literal("7.5", &ValueType::Any), Ok(Value::Float(7.5)));
        assert_eq!(literal("false", &ValueType::Any), Ok(Value::Bool(false)));
        assert_eq!(literal("hi", &ValueType::Any), Ok(Value::from("hi")));
        assert_eq!(
            literal("[1, \"a\"]", &ValueType::Any),
            Ok(Value::List(vec![Value::Int(1), Value::from("a")]))
        );
    }

    #[test]
    fn test_type_arguments() {
        let mut ctx = ParserContext::new(" list<int> x");
        assert_eq!(parse_type(&mut ctx, "val"), Some(ValueType::list(ValueType::Int)));

        let mut ctx = ParserContext::new("entity");
        assert!(parse_type(&mut ctx, "val").is_none());
        assert_eq!(
            ctx.error().unwrap().kind,
            ErrorKind::UnknownType {
                name: "entity".into()
            }
        );

        let mut ctx = ParserContext::new("");
        assert!(parse_type(&mut ctx, "val").is_none());
        assert!(matches!(
            ctx.error().unwrap().kind,
            ErrorKind::ExpectedTypeArgument { .. }
        ));
    }
}

//! Parser and invocation tests for the builtin command set

use anyhow::anyhow;

use super::*;

fn shed() -> Toolshed {
    let mut shed = Toolshed::with_builtins();
    shed.register(
        CommandDef::new("testvoid")
            .description("Returns nothing")
            .signature(Signature::new(|_| Ok(Value::Void))),
    );
    shed.register(
        CommandDef::new("testintstrarg").signature(
            Signature::new(|_| Ok(Value::Void))
                .arg(ArgSpec::value("n", ValueType::Int))
                .arg(ArgSpec::value("s", ValueType::String)),
        ),
    );
    shed.register(
        CommandDef::new("testtypearg").signature(
            Signature::new(|inv| Ok(Value::String(inv.type_arg(0)?.to_string())))
                .type_params(1)
                .returns(ValueType::String),
        ),
    );
    shed.register(
        CommandDef::new("testlist").signature(
            Signature::new(|inv| inv.value(0))
                .arg(ArgSpec::value("items", ValueType::list(ValueType::Int)))
                .returns(ValueType::list(ValueType::Int)),
        ),
    );
    shed.register(
        CommandDef::new("testfail")
            .signature(Signature::new(|_| Err(anyhow!("nope").context("outer")))),
    );
    shed.register(CommandDef::new("testpanic").signature(Signature::new(
        |_| -> anyhow::Result<Value> { panic!("boom") },
    )));
    shed
}

fn eval_in(shed: &Toolshed, ctx: &mut LocalContext, input: &str) -> Option<Value> {
    shed.eval(ctx, input, None)
}

fn eval(input: &str) -> Value {
    let mut ctx = LocalContext::new();
    match eval_in(&shed(), &mut ctx, input) {
        Some(v) => v,
        None => panic!("'{}' failed: {:?}", input, ctx.errors()),
    }
}

fn parse_error(input: &str) -> ConError {
    match shed().parse(input, None) {
        Ok(run) => panic!("'{}' parsed to {:?}", input, run.return_type()),
        Err(e) => e,
    }
}

fn parse_error_kind(input: &str) -> ErrorKind {
    parse_error(input).kind
}

fn complete(input: &str) -> CompletionResult {
    shed()
        .complete(input, None, [("x".to_string(), ValueType::Int)])
        .unwrap_or_else(|| panic!("no completions for '{}'", input))
}

fn ints(values: &[i64]) -> Value {
    Value::from(values.to_vec())
}

mod evaluation {
    use super::*;

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("i 2 + 2"), Value::Int(4));
        assert_eq!(eval("i 2 + { i 2 }"), Value::Int(4));
        assert_eq!(eval("i 2 + 2 * 2"), Value::Int(8));
        assert_eq!(eval("f 1.5 * 2"), Value::Float(3.0));
        assert_eq!(eval("i 7 / 2"), Value::Int(3));
        assert_eq!(eval("i 3 max 9"), Value::Int(9));
    }

    #[test]
    fn test_lists() {
        assert_eq!(eval("i 5 iota sum"), Value::Int(15));
        assert_eq!(eval("i 5 iota map { + 1 }"), ints(&[2, 3, 4, 5, 6]));
        assert_eq!(eval("i 5 iota take 2"), ints(&[1, 2]));
        assert_eq!(eval("i 5 iota count"), Value::Int(5));
        assert_eq!(eval("i 5 iota where { even }"), ints(&[2, 4]));
        assert_eq!(eval("i 5 iota not where { even }"), ints(&[1, 3, 5]));
        assert_eq!(eval("testlist [1, 2, 3] sum"), Value::Int(6));
    }

    #[test]
    fn test_unbraced_block_is_one_command() {
        assert_eq!(eval("i 3 iota map + 10 sum"), Value::Int(36));
    }

    #[test]
    fn test_terminators() {
        assert_eq!(eval("i 1 | + 1"), Value::Int(2));
        assert_eq!(eval("i 1;"), Value::Int(1));
        assert_eq!(eval("i 1 ;; i 1"), Value::Int(1));
        assert_eq!(eval("i 1\n+ 1"), Value::Int(2));
    }

    #[test]
    fn test_newline_terminates_without_multiline() {
        let mut shed = shed();
        shed.set_multiline_expressions(false);
        let mut ctx = LocalContext::new();
        assert_eq!(eval_in(&shed, &mut ctx, "i 1\ni 2"), Some(Value::Int(2)));
    }

    #[test]
    fn test_not_inverts() {
        assert_eq!(eval("i 3 not even"), Value::Bool(true));
        assert_eq!(eval("i 4 not even"), Value::Bool(false));
        assert_eq!(eval("i 4 even"), Value::Bool(true));
    }

    #[test]
    fn test_subcommands() {
        assert_eq!(eval("i 3 math:neg"), Value::Int(-3));
        assert_eq!(eval("f -2.5 math:abs"), Value::Float(2.5));
    }

    #[test]
    fn test_conversions_and_strings() {
        assert_eq!(eval("s hello"), Value::from("hello"));
        assert_eq!(eval("s \"a b\""), Value::from("a b"));
        assert_eq!(eval("i 3 iota tostring"), Value::from("[1, 2, 3]"));
        assert_eq!(eval("i 3 tofloat"), Value::Float(3.0));
        assert_eq!(eval("f 3.9 toint"), Value::Int(3));
        assert_eq!(eval("s 42 toint + 1"), Value::Int(43));
        assert_eq!(eval("i 1 types"), Value::from("int"));
        assert_eq!(eval("testtypearg list<int>"), Value::from("list<int>"));
    }

    #[test]
    fn test_variables() {
        let shed = shed();
        let mut ctx = LocalContext::new();
        assert_eq!(eval_in(&shed, &mut ctx, "i 2 => $x"), Some(Value::Int(2)));
        assert_eq!(eval_in(&shed, &mut ctx, "var $x"), Some(Value::Int(2)));
        assert_eq!(eval_in(&shed, &mut ctx, "val int $x"), Some(Value::Int(2)));
        assert_eq!(eval_in(&shed, &mut ctx, "var $x + $x"), Some(Value::Int(4)));
        assert_eq!(eval_in(&shed, &mut ctx, "i 1 + { var $x }"), Some(Value::Int(3)));
    }

    #[test]
    fn test_assignment_types_later_reads() {
        assert_eq!(eval("i 2 => $y; var $y + 1"), Value::Int(3));
    }

    #[test]
    fn test_echo_and_help_write_lines() {
        let shed = shed();
        let mut ctx = LocalContext::new();
        assert_eq!(eval_in(&shed, &mut ctx, "echo hi"), Some(Value::Void));
        assert_eq!(ctx.take_output(), vec!["hi".to_string()]);

        eval_in(&shed, &mut ctx, "help");
        let output = ctx.take_output();
        assert!(output.contains(&"i - An int literal".to_string()));
        assert!(output.contains(&"math:neg - Unary math operations".to_string()));
        assert!(output.contains(&"help - Lists every command".to_string()));
        assert!(output.contains(&"testvoid - Returns nothing".to_string()));
    }

    #[test]
    fn test_quoted_brackets_in_list_literals() {
        let mut ctx = ParserContext::new(r#"["a]", "b"]"#);
        assert_eq!(
            parse_literal(&mut ctx, &ValueType::list(ValueType::String)),
            Some(Value::from(vec!["a]", "b"]))
        );
        assert!(ctx.out_of_input());
    }
}

mod parse_errors {
    use super::*;

    #[test]
    fn test_out_of_input() {
        assert_eq!(parse_error_kind(""), ErrorKind::OutOfInput);
        assert_eq!(parse_error_kind(" "), ErrorKind::OutOfInput);
        assert_eq!(parse_error_kind("i 1 |"), ErrorKind::OutOfInput);
    }

    #[test]
    fn test_not_valid_command() {
        for input in ["}", "{}", ";", "|", ";;", "||", "i 1 ||", "i 1 |;", "5"] {
            assert_eq!(parse_error_kind(input), ErrorKind::NotValidCommand, "{}", input);
        }
    }

    #[test]
    fn test_unknown_command_span() {
        let err = parse_error("frobnicate");
        assert_eq!(
            err.kind,
            ErrorKind::UnknownCommand {
                name: "frobnicate".into()
            }
        );
        assert_eq!(err.span, Some(Span::new(0, 10)));
        assert_eq!(err.expression.as_deref(), Some("frobnicate"));
    }

    #[test]
    fn test_block_errors() {
        assert_eq!(parse_error_kind("i 2 + { }"), ErrorKind::EmptyCommandRun);
        assert_eq!(parse_error_kind("i { i 1 | }"), ErrorKind::UnexpectedCloseBrace);
        assert_eq!(parse_error_kind("i 2 + { i 2"), ErrorKind::MissingClosingBrace);
        assert_eq!(parse_error_kind("i 1 {"), ErrorKind::MissingClosingBrace);
        assert_eq!(
            parse_error_kind("i { i 1 ; }"),
            ErrorKind::WrongCommandReturn {
                expected: ValueType::Int,
                found: ValueType::Void
            }
        );
    }

    #[test]
    fn test_no_implementation() {
        assert!(matches!(
            parse_error_kind("i 1 ; + 1"),
            ErrorKind::NoImplementation { piped: None, .. }
        ));

        let ErrorKind::NoImplementation {
            accepted,
            conversion,
            ..
        } = parse_error_kind("f 1.5 iota")
        else {
            panic!("expected NoImplementation");
        };
        assert_eq!(accepted, vec![ValueType::Int]);
        assert_eq!(conversion.as_deref(), Some("toint"));
    }

    #[test]
    fn test_end_of_command() {
        let err = parse_error("testvoid testvoid");
        assert_eq!(err.kind, ErrorKind::EndOfCommand);
        assert_eq!(err.span, Some(Span::new(9, 10)));
    }

    #[test]
    fn test_arguments() {
        assert!(matches!(
            parse_error_kind("testintstrarg 1;"),
            ErrorKind::ExpectedArgument { .. }
        ));
        assert!(matches!(
            parse_error_kind("i two"),
            ErrorKind::ArgumentParse { .. }
        ));
        assert!(matches!(
            parse_error_kind("testtypearg"),
            ErrorKind::ExpectedTypeArgument { .. }
        ));
        assert_eq!(
            parse_error_kind("testtypearg invalidType"),
            ErrorKind::UnknownType {
                name: "invalidType".into()
            }
        );
    }

    #[test]
    fn test_unknown_subcommand() {
        let ErrorKind::UnknownSubcommand { valid, .. } = parse_error_kind("i 1 math:sqrt") else {
            panic!("expected UnknownSubcommand");
        };
        assert_eq!(valid, vec!["abs".to_string(), "neg".to_string()]);
    }
}

mod runtime {
    use super::*;

    #[test]
    fn test_runtime_error_points_at_command() {
        let shed = shed();
        let mut ctx = LocalContext::new();
        assert_eq!(eval_in(&shed, &mut ctx, "i 1 | / 0"), None);

        let err = &ctx.errors()[0];
        assert!(matches!(err.kind, ErrorKind::UnhandledException { .. }));
        assert_eq!(err.span, Some(Span::new(6, 9)));
        assert!(ctx.output()[0].ends_with("i 1 | / 0\n      ^^^"));
    }

    #[test]
    fn test_runtime_error_stops_the_run() {
        let shed = shed();
        let mut ctx = LocalContext::new();
        assert_eq!(eval_in(&shed, &mut ctx, "i 1 / 0; echo after"), None);
        assert_eq!(ctx.errors().len(), 1);
        assert!(!ctx.output().contains(&"after".to_string()));
    }

    #[test]
    fn test_iota_is_capped() {
        let shed = shed();
        let mut ctx = LocalContext::new();
        assert_eq!(
            eval_in(&shed, &mut ctx, "i 100000000000000 iota count"),
            None
        );
        assert_eq!(
            ctx.errors()[0].kind,
            ErrorKind::UnhandledException {
                message: format!(
                    "can't count past {} (asked for 100000000000000)",
                    builtins::MAX_IOTA
                ),
            }
        );

        ctx.clear_errors();
        let max = builtins::MAX_IOTA;
        assert_eq!(
            eval_in(&shed, &mut ctx, &format!("i {} iota count", max)),
            Some(Value::Int(max))
        );
    }

    #[test]
    fn test_block_error_keeps_inner_span() {
        let shed = shed();
        let mut ctx = LocalContext::new();
        assert_eq!(eval_in(&shed, &mut ctx, "i 5 iota map { / 0 }"), None);
        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.errors()[0].span, Some(Span::new(15, 18)));
    }

    #[test]
    fn test_errors_and_panics_are_caught() {
        let shed = shed();
        let mut ctx = LocalContext::new();
        assert_eq!(eval_in(&shed, &mut ctx, "testfail"), None);
        let err = &ctx.errors()[0];
        assert_eq!(
            err.kind,
            ErrorKind::UnhandledException {
                message: "outer".into()
            }
        );
        assert_eq!(err.trace.as_deref(), Some("nope"));

        ctx.clear_errors();
        assert_eq!(eval_in(&shed, &mut ctx, "testpanic"), None);
        assert_eq!(
            ctx.errors()[0].kind,
            ErrorKind::UnhandledException {
                message: "boom".into()
            }
        );
    }

    #[test]
    fn test_bad_var_type() {
        let shed = shed();
        let mut ctx = LocalContext::new();
        eval_in(&shed, &mut ctx, "i 2 => $x");
        assert_eq!(eval_in(&shed, &mut ctx, "val string $x"), None);
        assert!(matches!(
            ctx.errors()[0].kind,
            ErrorKind::BadVarType { .. }
        ));

        ctx.clear_errors();
        assert_eq!(eval_in(&shed, &mut ctx, "var $missing"), None);
        assert!(matches!(
            ctx.errors()[0].kind,
            ErrorKind::UndefinedVariable { .. }
        ));
    }

    #[test]
    fn test_pending_errors_block_invocation() {
        let shed = shed();
        let run = shed.parse("i 1", None).unwrap();
        let mut ctx = LocalContext::new();
        ctx.report_error(ConError::new(ErrorKind::OutOfInput));

        assert_eq!(run.invoke(None, &mut ctx), None);
        assert_eq!(
            ctx.errors().last().map(|e| &e.kind),
            Some(&ErrorKind::ImproperlyHandledErrors)
        );
    }

    #[test]
    fn test_permission_cache_follows_epoch() {
        let shed = shed();
        let run = shed.parse("i 1", None).unwrap();
        let mut ctx = LocalContext::new();
        assert_eq!(run.invoke(None, &mut ctx), Some(Value::Int(1)));

        ctx.deny("i");
        assert_eq!(run.invoke(None, &mut ctx), None);
        assert_eq!(
            ctx.errors()[0].kind,
            ErrorKind::NoPermission {
                command: "i".into()
            }
        );

        ctx.clear_errors();
        ctx.allow("i");
        assert_eq!(run.invoke(None, &mut ctx), Some(Value::Int(1)));
    }

    #[test]
    fn test_piped_input() {
        let shed = shed();
        let mut ctx = LocalContext::new();
        assert_eq!(
            shed.eval(&mut ctx, "+ 1", Some(Value::Int(41))),
            Some(Value::Int(42))
        );
    }
}

mod completions {
    use super::*;

    #[test]
    fn test_empty_input_lists_commands() {
        let result = complete("");
        assert!(result.contains("i"));
        assert!(result.contains("help"));
        assert!(!result.contains("sum"));
    }

    #[test]
    fn test_commands_for_piped_type() {
        let result = complete("i 5 t");
        assert!(result.contains("tostring"));
        assert!(result.contains("tofloat"));
        assert!(!result.contains("take"));
    }

    #[test]
    fn test_partial_name() {
        let result = complete("va");
        let values: Vec<&str> = result.values().take(2).collect();
        assert_eq!(values, vec!["val", "var"]);
    }

    #[test]
    fn test_after_pipe() {
        let result = complete("i 1 | ");
        assert!(result.contains("+"));
        assert!(result.contains("iota"));
        assert!(!result.contains("i"));
    }

    #[test]
    fn test_variables() {
        assert!(complete("i 1 + $").contains("$x"));
        assert!(complete("var $").contains("$x"));
    }

    #[test]
    fn test_argument_hint() {
        let result = complete("i 1 + ");
        assert_eq!(result.hint.as_deref(), Some("<y: int>"));
        assert!(result.contains("$x"));
    }

    #[test]
    fn test_subcommands() {
        let result = complete("i 1 math:");
        let values: Vec<&str> = result.values().collect();
        assert_eq!(values, vec!["abs", "neg"]);
    }

    #[test]
    fn test_type_arguments() {
        let result = complete("val ");
        assert!(result.contains("int"));
        assert!(result.contains("list<"));
    }

    #[test]
    fn test_block_argument() {
        let result = complete("i 3 iota map ");
        assert!(result.contains("{"));
        assert!(result.contains("even"));
    }
}

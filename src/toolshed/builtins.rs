//! The builtin command set

use std::sync::PoisonError;

use anyhow::{anyhow, bail};

use super::command::{ArgSpec, BlockInput, CommandDef, Signature, Toolshed, TypeEnv};
use super::invocation::Invocation;
use super::value::ValueType::{Any, Bool, Float, Int};
use super::value::{Value, ValueType};

fn piped_int(inv: &Invocation<'_>) -> anyhow::Result<i64> {
    inv.piped()
        .as_int()
        .ok_or_else(|| anyhow!("expected an int to be piped in, got {}", inv.piped().value_type()))
}

fn piped_float(inv: &Invocation<'_>) -> anyhow::Result<f64> {
    inv.piped()
        .as_float()
        .ok_or_else(|| anyhow!("expected a float to be piped in, got {}", inv.piped().value_type()))
}

fn piped_list(inv: &mut Invocation<'_>) -> anyhow::Result<Vec<Value>> {
    match inv.take_piped() {
        Value::List(items) => Ok(items),
        other => bail!("expected a list to be piped in, got {}", other.value_type()),
    }
}

/// Largest count `iota` will build; lists are held in memory
pub const MAX_IOTA: i64 = 1_000_000;

fn any_list() -> ValueType {
    ValueType::list(Any)
}

fn literal(name: &'static str, ty: ValueType, description: &str) -> CommandDef {
    let expected = ty.clone();
    CommandDef::new(name).description(description).signature(
        Signature::new(move |inv| {
            let value = inv.value(0)?;
            if !value.value_type().is_assignable_to(&expected) {
                bail!("expected {}, got {}", expected, value.value_type());
            }
            Ok(value)
        })
        .arg(ArgSpec::value("value", ty.clone()))
        .returns(ty),
    )
}

fn arithmetic(
    name: &'static str,
    description: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> CommandDef {
    CommandDef::new(name)
        .description(description)
        .signature(
            Signature::new(move |inv| {
                let x = piped_int(inv)?;
                let y = inv.int(0)?;
                int_op(x, y)
                    .map(Value::Int)
                    .ok_or_else(|| anyhow!("'{} {} {}' overflowed or divided by zero", x, name, y))
            })
            .piped(Int)
            .arg(ArgSpec::value("y", Int))
            .returns(Int),
        )
        .signature(
            Signature::new(move |inv| {
                let x = piped_float(inv)?;
                let y = inv.float(0)?;
                Ok(Value::Float(float_op(x, y)))
            })
            .piped(Float)
            .arg(ArgSpec::value("y", Float))
            .returns(Float),
        )
}

fn block_list_type(env: &TypeEnv<'_>) -> ValueType {
    ValueType::list(env.blocks.first().cloned().unwrap_or(Any))
}

fn variable_type(env: &TypeEnv<'_>) -> ValueType {
    env.variables.first().cloned().flatten().unwrap_or(Any)
}

fn first_type_arg(env: &TypeEnv<'_>) -> ValueType {
    env.type_args.first().cloned().unwrap_or(Any)
}

fn sequences() -> Vec<CommandDef> {
    vec![
        CommandDef::new("iota")
            .description("Counts from 1 up to the piped number")
            .signature(
                Signature::new(|inv| {
                    let n = piped_int(inv)?;
                    if n < 0 {
                        bail!("can't count up to a negative number ({})", n);
                    }
                    if n > MAX_IOTA {
                        bail!("can't count past {} (asked for {})", MAX_IOTA, n);
                    }
                    Ok(Value::List((1..=n).map(Value::Int).collect()))
                })
                .piped(Int)
                .returns(ValueType::list(Int)),
            ),
        CommandDef::new("sum")
            .description("Adds up a list of numbers")
            .signature(
                Signature::new(|inv| {
                    let mut total: i64 = 0;
                    for item in piped_list(inv)? {
                        let v = item.as_int().ok_or_else(|| anyhow!("not an int: {}", item))?;
                        total = total.checked_add(v).ok_or_else(|| anyhow!("sum overflowed"))?;
                    }
                    Ok(Value::Int(total))
                })
                .piped(ValueType::list(Int))
                .returns(Int),
            )
            .signature(
                Signature::new(|inv| {
                    let items = piped_list(inv)?;
                    Ok(Value::Float(items.iter().filter_map(Value::as_float).sum()))
                })
                .piped(ValueType::list(Float))
                .returns(Float),
            ),
        CommandDef::new("count")
            .description("Number of items in the piped list")
            .signature(
                Signature::new(|inv| {
                    let len = piped_list(inv)?.len();
                    Ok(Value::Int(i64::try_from(len)?))
                })
                .piped(any_list())
                .returns(Int),
            ),
        CommandDef::new("take")
            .description("The first n items of the piped list")
            .signature(
                Signature::new(|inv| {
                    let n = inv.int(0)?;
                    let mut items = piped_list(inv)?;
                    items.truncate(usize::try_from(n.max(0))?);
                    Ok(Value::List(items))
                })
                .piped(any_list())
                .arg(ArgSpec::value("amount", Int))
                .returns_piped(),
            ),
        CommandDef::new("map")
            .description("Runs a block on every item of the piped list")
            .signature(
                Signature::new(|inv| {
                    let items = piped_list(inv)?;
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(inv.run_block(0, Some(item))?);
                    }
                    Ok(Value::List(out))
                })
                .piped(any_list())
                .arg(ArgSpec::block("mapper", BlockInput::Element, None))
                .returns_with(block_list_type),
            ),
        CommandDef::new("where")
            .description("Keeps the items of the piped list the block returns true for")
            .signature(
                Signature::new(|inv| {
                    let inverted = inv.inverted();
                    let items = piped_list(inv)?;
                    let mut out = Vec::new();
                    for item in items {
                        let keep = inv.run_block(0, Some(item.clone()))?;
                        if keep.as_bool() == Some(!inverted) {
                            out.push(item);
                        }
                    }
                    Ok(Value::List(out))
                })
                .piped(any_list())
                .arg(ArgSpec::block("check", BlockInput::Element, Some(Bool)))
                .returns_piped(),
            ),
    ]
}

fn numbers() -> Vec<CommandDef> {
    vec![
        arithmetic("+", "Adds two numbers", i64::checked_add, |x, y| x + y),
        arithmetic("-", "Subtracts two numbers", i64::checked_sub, |x, y| x - y),
        arithmetic("*", "Multiplies two numbers", i64::checked_mul, |x, y| x * y),
        arithmetic("/", "Divides two numbers", i64::checked_div, |x, y| x / y),
        arithmetic("max", "The larger of two numbers", |x, y| Some(x.max(y)), f64::max),
        CommandDef::new("even")
            .description("Whether the piped number is even")
            .signature(
                Signature::new(|inv| {
                    let even = piped_int(inv)? % 2 == 0;
                    Ok(Value::Bool(even != inv.inverted()))
                })
                .piped(Int)
                .returns(Bool),
            ),
        CommandDef::new("math")
            .description("Unary math operations")
            .signature(
                Signature::new(|inv| {
                    let x = piped_int(inv)?;
                    x.checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| anyhow!("can't negate {}", x))
                })
                .subcommand("neg")
                .piped(Int)
                .returns(Int),
            )
            .signature(
                Signature::new(|inv| Ok(Value::Float(-piped_float(inv)?)))
                    .subcommand("neg")
                    .piped(Float)
                    .returns(Float),
            )
            .signature(
                Signature::new(|inv| {
                    let x = piped_int(inv)?;
                    x.checked_abs()
                        .map(Value::Int)
                        .ok_or_else(|| anyhow!("can't take the absolute value of {}", x))
                })
                .subcommand("abs")
                .piped(Int)
                .returns(Int),
            )
            .signature(
                Signature::new(|inv| Ok(Value::Float(piped_float(inv)?.abs())))
                    .subcommand("abs")
                    .piped(Float)
                    .returns(Float),
            ),
    ]
}

fn variables() -> Vec<CommandDef> {
    vec![
        CommandDef::new("=>")
            .description("Stores the piped value in a variable and passes it on")
            .signature(
                Signature::new(|inv| {
                    let name = inv.var_name(0)?;
                    let value = inv.take_piped();
                    inv.write_var(name, value.clone());
                    Ok(value)
                })
                .piped(Any)
                .arg(ArgSpec::assign("target"))
                .returns_piped(),
            ),
        CommandDef::new("var")
            .description("Reads a variable")
            .signature(
                Signature::new(|inv| {
                    let name = inv.var_name(0)?;
                    inv.read_var(name, &Any)
                })
                .arg(ArgSpec::variable("name"))
                .returns_with(variable_type),
            ),
        CommandDef::new("val")
            .description("Reads a variable, checking it holds the given type")
            .signature(
                Signature::new(|inv| {
                    let ty = inv.type_arg(0)?;
                    let name = inv.var_name(0)?;
                    inv.read_var(name, ty)
                })
                .type_params(1)
                .arg(ArgSpec::variable("name"))
                .returns_with(first_type_arg),
            ),
    ]
}

fn conversions() -> Vec<CommandDef> {
    vec![
        CommandDef::new("tostring")
            .description("Converts the piped value to a string")
            .conversion()
            .signature(
                Signature::new(|inv| Ok(Value::String(inv.take_piped().to_string())))
                    .piped(Any)
                    .returns(ValueType::String),
            ),
        CommandDef::new("tofloat")
            .description("Converts the piped value to a float")
            .conversion()
            .signature(
                Signature::new(|inv| Ok(Value::Float(piped_int(inv)? as f64)))
                    .piped(Int)
                    .returns(Float),
            )
            .signature(
                Signature::new(|inv| {
                    let s = inv.take_piped();
                    let text = s.as_str().unwrap_or_default().trim();
                    Ok(Value::Float(text.parse()?))
                })
                .piped(ValueType::String)
                .returns(Float),
            ),
        CommandDef::new("toint")
            .description("Converts the piped value to an int, truncating floats")
            .conversion()
            .signature(
                Signature::new(|inv| {
                    let x = piped_float(inv)?;
                    if !x.is_finite() {
                        bail!("{} has no integer value", x);
                    }
                    Ok(Value::Int(x.trunc() as i64))
                })
                .piped(Float)
                .returns(Int),
            )
            .signature(
                Signature::new(|inv| {
                    let s = inv.take_piped();
                    let text = s.as_str().unwrap_or_default().trim();
                    Ok(Value::Int(text.parse()?))
                })
                .piped(ValueType::String)
                .returns(Int),
            )
            .signature(
                Signature::new(|inv| Ok(Value::Int(i64::from(inv.piped().as_bool() == Some(true)))))
                    .piped(Bool)
                    .returns(Int),
            ),
    ]
}

fn misc() -> Vec<CommandDef> {
    vec![
        CommandDef::new("echo")
            .description("Writes a line to the console")
            .signature(
                Signature::new(|inv| {
                    let text = inv.string(0)?;
                    inv.write_line(&text);
                    Ok(Value::Void)
                })
                .arg(ArgSpec::value("text", ValueType::String)),
            ),
        CommandDef::new("types")
            .description("Name of the piped value's type")
            .signature(
                Signature::new(|inv| Ok(Value::String(inv.piped().value_type().to_string())))
                    .piped(Any)
                    .returns(ValueType::String),
            ),
    ]
}

/// Register every builtin command into `shed`
pub fn register_builtins(shed: &mut Toolshed) {
    let literals = [
        literal("i", Int, "An int literal"),
        literal("f", Float, "A float literal"),
        literal("s", ValueType::String, "A string literal"),
        literal("b", Bool, "A bool literal"),
    ];

    for def in literals
        .into_iter()
        .chain(numbers())
        .chain(sequences())
        .chain(variables())
        .chain(conversions())
        .chain(misc())
    {
        shed.register(def);
    }

    // Reads the shared listing, so commands registered later show up too
    let listing = shed.listing();
    shed.register(
        CommandDef::new("help")
            .description("Lists every command")
            .signature(Signature::new(move |inv| {
                let lines = listing.read().unwrap_or_else(PoisonError::into_inner);
                for line in lines.iter() {
                    inv.write_line(line);
                }
                Ok(Value::Void)
            })),
    );
}

//! The textual command language accepted by the executor (§6.1): a `Command` enum and
//! a small hand-written, token-at-a-time tokenizer — considerably smaller than a SQL
//! expression grammar since there's none to support, just flat, comma-separated
//! positional arguments.

use crate::error::{ExecError, ExecResult};

/// One parsed statement, one variant per row of §6.1's DSL table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateDb { name: String },
    CreateTable { name: String, db: String, col_count: usize },
    CreateColumn { name: String, db: String, table: String },
    CreateIndex { db: String, table: String, col: String, sorted: bool, clustered: bool },
    RelationalInsert { db: String, table: String, values: Vec<i32> },
    SelectBase { out: String, db: String, table: String, col: String, low: Option<i32>, high: Option<i32> },
    SelectIntermediate { out: String, pos: String, val: String, low: Option<i32>, high: Option<i32> },
    Fetch { out: String, db: String, table: String, col: String, pos: String },
    Avg { out: String, x: String },
    Sum { out: String, x: String },
    Min { out: String, x: String },
    Max { out: String, x: String },
    Add { out: String, a: String, b: String },
    Sub { out: String, a: String, b: String },
    Print { names: Vec<String> },
    Join { out_l: String, out_r: String, f1: String, p1: String, f2: String, p2: String, hash: bool },
    BatchQueries,
    BatchExecute,
    Shutdown,
    Load { path: String },
}

/// Parse one statement line. Lines are of the form `name=op(args)`, `op(args)`, or a
/// bare keyword (`batch_queries`, `batch_execute`, `shutdown`).
pub fn parse(line: &str) -> ExecResult<Command> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ExecError::IncorrectFormat("empty statement".into()));
    }

    let (assign, rest) = match line.split_once('=') {
        Some((lhs, rhs)) if !lhs.contains('(') => (Some(lhs.trim()), rhs.trim()),
        _ => (None, line),
    };

    match rest {
        "batch_queries" => return Ok(Command::BatchQueries),
        "batch_execute" => return Ok(Command::BatchExecute),
        "shutdown" => return Ok(Command::Shutdown),
        _ => {}
    }

    let (op, args) = split_call(rest)?;
    let args: Vec<&str> = if args.is_empty() {
        Vec::new()
    } else {
        split_top_level(args)
    };

    match op {
        "create" => parse_create(&args),
        "relational_insert" => parse_insert(&args),
        "select" => parse_select(assign, &args),
        "fetch" => parse_fetch(assign, &args),
        "avg" => Ok(Command::Avg { out: require_assign(assign)?, x: arg(&args, 0)?.to_string() }),
        "sum" => Ok(Command::Sum { out: require_assign(assign)?, x: arg(&args, 0)?.to_string() }),
        "min" => Ok(Command::Min { out: require_assign(assign)?, x: arg(&args, 0)?.to_string() }),
        "max" => Ok(Command::Max { out: require_assign(assign)?, x: arg(&args, 0)?.to_string() }),
        "add" => Ok(Command::Add {
            out: require_assign(assign)?,
            a: arg(&args, 0)?.to_string(),
            b: arg(&args, 1)?.to_string(),
        }),
        "sub" => Ok(Command::Sub {
            out: require_assign(assign)?,
            a: arg(&args, 0)?.to_string(),
            b: arg(&args, 1)?.to_string(),
        }),
        "print" => Ok(Command::Print { names: args.iter().map(|s| s.to_string()).collect() }),
        "join" => parse_join(assign, &args),
        "load" => {
            let path = arg(&args, 0)?.trim_matches('"').to_string();
            Ok(Command::Load { path })
        }
        other => Err(ExecError::UnknownCommand(other.to_string())),
    }
}

fn split_call(s: &str) -> ExecResult<(&str, &str)> {
    let open = s
        .find('(')
        .ok_or_else(|| ExecError::IncorrectFormat(format!("missing '(' in '{s}'")))?;
    let close = s
        .rfind(')')
        .ok_or_else(|| ExecError::IncorrectFormat(format!("missing ')' in '{s}'")))?;
    if close < open {
        return Err(ExecError::IncorrectFormat(format!("malformed call '{s}'")));
    }
    Ok((s[..open].trim(), s[open + 1..close].trim()))
}

/// Split `a,b,c` on top-level commas (none of these arguments nest parens or quotes
/// containing commas in this grammar, but guard anyway for `load("a,b")`-style paths).
fn split_top_level(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth -= 1,
            ',' if depth == 0 && !in_quotes => {
                out.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(s[start..].trim());
    out
}

fn arg<'a>(args: &[&'a str], i: usize) -> ExecResult<&'a str> {
    args.get(i)
        .copied()
        .ok_or_else(|| ExecError::IncorrectFormat(format!("missing argument {i}")))
}

fn require_assign(assign: Option<&str>) -> ExecResult<String> {
    assign
        .map(|s| s.to_string())
        .ok_or_else(|| ExecError::IncorrectFormat("expected 'name=...' assignment".into()))
}

fn parse_null_or_int(s: &str) -> ExecResult<Option<i32>> {
    if s == "null" {
        Ok(None)
    } else {
        s.parse::<i32>()
            .map(Some)
            .map_err(|_| ExecError::IncorrectFormat(format!("not an integer or 'null': '{s}'")))
    }
}

/// Split `db.tbl.col` / `db.tbl` on '.'.
fn split_dotted(s: &str) -> Vec<&str> {
    s.split('.').collect()
}

fn parse_create(args: &[&str]) -> ExecResult<Command> {
    match arg(args, 0)? {
        "db" => Ok(Command::CreateDb { name: unquote(arg(args, 1)?) }),
        "tbl" => {
            let name = unquote(arg(args, 1)?);
            let db = arg(args, 2)?.to_string();
            let col_count = arg(args, 3)?
                .parse::<usize>()
                .map_err(|_| ExecError::IncorrectFormat("column count must be an integer".into()))?;
            Ok(Command::CreateTable { name, db, col_count })
        }
        "col" => {
            let name = unquote(arg(args, 1)?);
            let parts = split_dotted(arg(args, 2)?);
            if parts.len() != 2 {
                return Err(ExecError::IncorrectFormat("expected db.tbl".into()));
            }
            Ok(Command::CreateColumn { name, db: parts[0].to_string(), table: parts[1].to_string() })
        }
        "idx" => {
            let parts = split_dotted(arg(args, 1)?);
            if parts.len() != 3 {
                return Err(ExecError::IncorrectFormat("expected db.tbl.col".into()));
            }
            let sorted = match arg(args, 2)? {
                "sorted" => true,
                "btree" => false,
                other => return Err(ExecError::IncorrectFormat(format!("unknown index kind '{other}'"))),
            };
            let clustered = match arg(args, 3)? {
                "clustered" => true,
                "unclustered" => false,
                other => return Err(ExecError::IncorrectFormat(format!("unknown clustering '{other}'"))),
            };
            Ok(Command::CreateIndex {
                db: parts[0].to_string(),
                table: parts[1].to_string(),
                col: parts[2].to_string(),
                sorted,
                clustered,
            })
        }
        other => Err(ExecError::IncorrectFormat(format!("unknown create target '{other}'"))),
    }
}

fn unquote(s: &str) -> String {
    s.trim_matches('"').to_string()
}

fn parse_insert(args: &[&str]) -> ExecResult<Command> {
    let parts = split_dotted(arg(args, 0)?);
    if parts.len() != 2 {
        return Err(ExecError::IncorrectFormat("expected db.tbl".into()));
    }
    let values = args[1..]
        .iter()
        .map(|s| {
            s.parse::<i32>()
                .map_err(|_| ExecError::IncorrectFormat(format!("not an integer: '{s}'")))
        })
        .collect::<ExecResult<Vec<i32>>>()?;
    Ok(Command::RelationalInsert { db: parts[0].to_string(), table: parts[1].to_string(), values })
}

fn parse_select(assign: Option<&str>, args: &[&str]) -> ExecResult<Command> {
    let out = require_assign(assign)?;
    let first = arg(args, 0)?;
    if first == "pos" {
        Ok(Command::SelectIntermediate {
            out,
            pos: arg(args, 0)?.to_string(),
            val: arg(args, 1)?.to_string(),
            low: parse_null_or_int(arg(args, 2)?)?,
            high: parse_null_or_int(arg(args, 3)?)?,
        })
    } else if first.contains('.') {
        let parts = split_dotted(first);
        if parts.len() != 3 {
            return Err(ExecError::IncorrectFormat("expected db.tbl.col".into()));
        }
        Ok(Command::SelectBase {
            out,
            db: parts[0].to_string(),
            table: parts[1].to_string(),
            col: parts[2].to_string(),
            low: parse_null_or_int(arg(args, 1)?)?,
            high: parse_null_or_int(arg(args, 2)?)?,
        })
    } else {
        // select(pos_name, val_name, low, high) against two bare intermediate names.
        Ok(Command::SelectIntermediate {
            out,
            pos: first.to_string(),
            val: arg(args, 1)?.to_string(),
            low: parse_null_or_int(arg(args, 2)?)?,
            high: parse_null_or_int(arg(args, 3)?)?,
        })
    }
}

fn parse_fetch(assign: Option<&str>, args: &[&str]) -> ExecResult<Command> {
    let out = require_assign(assign)?;
    let parts = split_dotted(arg(args, 0)?);
    if parts.len() != 3 {
        return Err(ExecError::IncorrectFormat("expected db.tbl.col".into()));
    }
    Ok(Command::Fetch {
        out,
        db: parts[0].to_string(),
        table: parts[1].to_string(),
        col: parts[2].to_string(),
        pos: arg(args, 1)?.to_string(),
    })
}

fn parse_join(assign: Option<&str>, args: &[&str]) -> ExecResult<Command> {
    let assign = assign.ok_or_else(|| ExecError::IncorrectFormat("join requires 'l,r=join(...)'".into()))?;
    let outs: Vec<&str> = assign.split(',').map(str::trim).collect();
    if outs.len() != 2 {
        return Err(ExecError::IncorrectFormat("join requires two output names".into()));
    }
    let hash = match arg(args, 4)? {
        "hash" => true,
        "nested-loop" => false,
        other => return Err(ExecError::IncorrectFormat(format!("unknown join strategy '{other}'"))),
    };
    Ok(Command::Join {
        out_l: outs[0].to_string(),
        out_r: outs[1].to_string(),
        f1: arg(args, 0)?.to_string(),
        p1: arg(args, 1)?.to_string(),
        f2: arg(args, 2)?.to_string(),
        p2: arg(args, 3)?.to_string(),
        hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_db() {
        assert_eq!(parse(r#"create(db,"d")"#).unwrap(), Command::CreateDb { name: "d".into() });
    }

    #[test]
    fn parses_relational_insert() {
        let got = parse("relational_insert(d.t,1,10)").unwrap();
        assert_eq!(
            got,
            Command::RelationalInsert { db: "d".into(), table: "t".into(), values: vec![1, 10] }
        );
    }

    #[test]
    fn parses_base_select_with_null_bound() {
        let got = parse("h=select(d.t.a,2,null)").unwrap();
        assert_eq!(
            got,
            Command::SelectBase {
                out: "h".into(),
                db: "d".into(),
                table: "t".into(),
                col: "a".into(),
                low: Some(2),
                high: None,
            }
        );
    }

    #[test]
    fn parses_join_with_two_outputs() {
        let got = parse("l,r=join(f1,p1,f2,p2,hash)").unwrap();
        assert_eq!(
            got,
            Command::Join {
                out_l: "l".into(),
                out_r: "r".into(),
                f1: "f1".into(),
                p1: "p1".into(),
                f2: "f2".into(),
                p2: "p2".into(),
                hash: true,
            }
        );
    }

    #[test]
    fn parses_bare_keywords() {
        assert_eq!(parse("batch_queries").unwrap(), Command::BatchQueries);
        assert_eq!(parse("shutdown").unwrap(), Command::Shutdown);
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(matches!(parse("frobnicate(1,2)"), Err(ExecError::UnknownCommand(_))));
    }
}

//! Dispatches a parsed [`crate::dsl::Command`] against a [`Catalog`] and a connection's
//! [`ClientContext`] (§4.12, §4.11). One `Executor` serves one connection; the catalog
//! is shared (passed by `&mut` here — a real multi-connection server would hold it
//! behind a lock, see `server::serve`).

use tracing::{info, warn};

use crate::aggregate;
use crate::batch::{self, SelectJob};
use crate::catalog::Catalog;
use crate::column::IndexKind;
use crate::config::Config;
use crate::context::{BatchState, ClientContext};
use crate::dsl::Command;
use crate::error::{ExecError, ExecResult, StatusCode};
use crate::fetch;
use crate::join::{self, JoinSide, JoinStrategy};
use crate::load;
use crate::select;
use crate::table::Table;
use crate::value::TypedVec;

/// A pending batched select, captured by name so it can be resolved against the live
/// column set at drain time (columns may only gain an index between enqueue and drain,
/// never change identity).
struct PendingSelect {
    out: String,
    db: String,
    table: String,
    col: String,
    low: Option<i32>,
    high: Option<i32>,
}

pub struct Executor {
    pub catalog: Catalog,
    pub context: ClientContext,
    pending: Vec<PendingSelect>,
}

impl Executor {
    pub fn new(catalog: Catalog) -> Self {
        Executor {
            catalog,
            context: ClientContext::new(),
            pending: Vec::new(),
        }
    }

    fn config(&self) -> Config {
        self.catalog.config.clone()
    }

    fn table<'a>(&'a self, db: &str, table: &str) -> ExecResult<&'a Table> {
        let active = self.catalog.database()?;
        if active.name != db {
            return Err(ExecError::ObjectNotFound(db.to_string()));
        }
        active
            .find_table(table)
            .ok_or_else(|| ExecError::ObjectNotFound(table.to_string()))
    }

    /// Run one statement to completion, returning the status it resolves to (§7).
    pub fn execute(&mut self, cmd: Command) -> ExecResult<StatusCode> {
        if self.context.state() == BatchState::Batching && !matches!(cmd, Command::SelectBase { .. } | Command::BatchExecute) {
            return Err(ExecError::IncorrectFormat(
                "only select or batch_execute is allowed while batching".into(),
            ));
        }

        match cmd {
            Command::CreateDb { name } => {
                self.catalog.create_database(&name)?;
                Ok(StatusCode::OkDone)
            }
            Command::CreateTable { name, db, col_count } => {
                self.require_active_db(&db)?;
                self.catalog.create_table(&name, col_count)?;
                Ok(StatusCode::OkDone)
            }
            Command::CreateColumn { name, db, table } => {
                self.require_active_db(&db)?;
                self.catalog.add_column(&table, &name)?;
                Ok(StatusCode::OkDone)
            }
            Command::CreateIndex { db, table, col, sorted, clustered } => {
                self.require_active_db(&db)?;
                let config = self.config();
                let kind = if sorted { IndexKind::Sorted } else { IndexKind::BTree };
                let t = self
                    .catalog
                    .database_mut()?
                    .find_table_mut(&table)
                    .ok_or_else(|| ExecError::ObjectNotFound(table.clone()))?;
                t.create_index(&col, kind, clustered, &config)?;
                Ok(StatusCode::OkDone)
            }
            Command::RelationalInsert { db, table, values } => {
                if self.context.is_batch_active() {
                    return Err(ExecError::IncorrectFormat(
                        "writes are forbidden while a batch is pending".into(),
                    ));
                }
                self.require_active_db(&db)?;
                self.catalog
                    .database_mut()?
                    .find_table_mut(&table)
                    .ok_or_else(|| ExecError::ObjectNotFound(table))?
                    .insert(&values)?;
                Ok(StatusCode::OkDone)
            }
            Command::SelectBase { out, db, table, col, low, high } => {
                if self.context.state() == BatchState::Batching {
                    self.pending.push(PendingSelect { out, db, table, col, low, high });
                    return Ok(StatusCode::BatchWait);
                }
                self.require_active_db(&db)?;
                let config = self.config();
                let column = self
                    .table(&db, &table)?
                    .find_column(&col)
                    .ok_or_else(|| ExecError::ObjectNotFound(col))?;
                let result = select::select_base(column, low, high, &config);
                self.context.set(&out, result);
                Ok(StatusCode::OkWaitForResponse)
            }
            Command::SelectIntermediate { out, pos, val, low, high } => {
                let positions = self.context.get(&pos)?;
                let values = self.context.get(&val)?;
                let result = select::select_intermediate(&positions, &values, low, high)?;
                self.context.set(&out, result);
                Ok(StatusCode::OkWaitForResponse)
            }
            Command::Fetch { out, db, table, col, pos } => {
                self.require_active_db(&db)?;
                let column = self
                    .table(&db, &table)?
                    .find_column(&col)
                    .ok_or_else(|| ExecError::ObjectNotFound(col))?;
                let positions = self.context.get(&pos)?;
                let result = fetch::fetch(column, &positions)?;
                self.context.set(&out, result);
                Ok(StatusCode::OkWaitForResponse)
            }
            Command::Avg { out, x } => {
                let v = self.context.get(&x)?;
                self.context.set(&out, aggregate::avg(&v));
                Ok(StatusCode::OkWaitForResponse)
            }
            Command::Sum { out, x } => {
                let v = self.context.get(&x)?;
                self.context.set(&out, aggregate::sum(&v));
                Ok(StatusCode::OkWaitForResponse)
            }
            Command::Min { out, x } => {
                let v = self.context.get(&x)?;
                self.context.set(&out, aggregate::min(&v)?);
                Ok(StatusCode::OkWaitForResponse)
            }
            Command::Max { out, x } => {
                let v = self.context.get(&x)?;
                self.context.set(&out, aggregate::max(&v)?);
                Ok(StatusCode::OkWaitForResponse)
            }
            Command::Add { out, a, b } => {
                let av = self.context.get(&a)?;
                let bv = self.context.get(&b)?;
                self.context.set(&out, aggregate::add(&av, &bv)?);
                Ok(StatusCode::OkWaitForResponse)
            }
            Command::Sub { out, a, b } => {
                let av = self.context.get(&a)?;
                let bv = self.context.get(&b)?;
                self.context.set(&out, aggregate::sub(&av, &bv)?);
                Ok(StatusCode::OkWaitForResponse)
            }
            Command::Print { names } => {
                let vecs: Vec<TypedVec> = names
                    .iter()
                    .map(|n| self.context.get(n))
                    .collect::<ExecResult<Vec<_>>>()?;
                Ok(StatusCode::OkPrint(format_print(&vecs)?))
            }
            Command::Join { out_l, out_r, f1, p1, f2, p2, hash } => {
                let f1v = self.context.get(&f1)?;
                let p1v = self.context.get(&p1)?;
                let f2v = self.context.get(&f2)?;
                let p2v = self.context.get(&p2)?;
                let (v1, pos1) = as_join_side(&f1v, &p1v)?;
                let (v2, pos2) = as_join_side(&f2v, &p2v)?;
                let strategy = if hash { JoinStrategy::Hash } else { JoinStrategy::NestedLoop };
                let config = self.config();
                let (lp, rp) = join::run(
                    &JoinSide { values: &v1, positions: &pos1 },
                    &JoinSide { values: &v2, positions: &pos2 },
                    strategy,
                    &config,
                );
                self.context.set(&out_l, TypedVec::I64(lp));
                self.context.set(&out_r, TypedVec::I64(rp));
                Ok(StatusCode::OkWaitForResponse)
            }
            Command::BatchQueries => {
                self.context.begin_batch()?;
                Ok(StatusCode::OkDone)
            }
            Command::BatchExecute => {
                self.context.begin_drain()?;
                let config = self.config();
                let active = self.catalog.database()?;
                let mut jobs = Vec::with_capacity(self.pending.len());
                for p in self.pending.drain(..) {
                    if active.name != p.db {
                        return Err(ExecError::ObjectNotFound(p.db));
                    }
                    let table = active
                        .find_table(&p.table)
                        .ok_or_else(|| ExecError::ObjectNotFound(p.table.clone()))?;
                    let column = table
                        .find_column(&p.col)
                        .ok_or_else(|| ExecError::ObjectNotFound(p.col.clone()))?;
                    jobs.push(SelectJob { out_name: p.out, column, low: p.low, high: p.high });
                }
                batch::drain(jobs, &self.context, &config);
                self.context.finish_drain();
                Ok(StatusCode::OkDone)
            }
            Command::Shutdown => {
                info!("shutdown: snapshotting catalog");
                self.catalog.snapshot()?;
                Ok(StatusCode::OkShutdown)
            }
            Command::Load { path } => {
                let config = self.config();
                match load::load(&mut self.catalog, &config, &path) {
                    Ok(_) => Ok(StatusCode::OkDone),
                    Err(e) => {
                        warn!(path, error = %e, "load failed");
                        Err(e)
                    }
                }
            }
        }
    }

    fn require_active_db(&self, name: &str) -> ExecResult<()> {
        let db = self.catalog.database()?;
        if db.name != name {
            return Err(ExecError::ObjectNotFound(name.to_string()));
        }
        Ok(())
    }
}

fn as_join_side(values: &TypedVec, positions: &TypedVec) -> ExecResult<(Vec<i32>, Vec<i64>)> {
    let v = match values {
        TypedVec::I32(v) => v.clone(),
        _ => return Err(ExecError::IncorrectFormat("join values must be int32".into())),
    };
    let p = positions
        .as_positions()
        .ok_or_else(|| ExecError::IncorrectFormat("join positions must be int64".into()))?
        .to_vec();
    if v.len() != p.len() {
        return Err(ExecError::IncorrectFormat("join inputs must have equal length".into()));
    }
    Ok((v, p))
}

/// Format intermediates columnwise, one CSV line per tuple (§6.1 `print`).
fn format_print(vecs: &[TypedVec]) -> ExecResult<String> {
    let len = vecs.first().map(|v| v.len()).unwrap_or(0);
    if vecs.iter().any(|v| v.len() != len) {
        return Err(ExecError::IncorrectFormat(
            "print requires equal-length intermediates".into(),
        ));
    }
    let mut lines = Vec::with_capacity(len);
    for i in 0..len {
        let fields: Vec<String> = vecs.iter().map(|v| v.format_at(i)).collect();
        lines.push(fields.join(","));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl;

    fn run(exec: &mut Executor, line: &str) -> StatusCode {
        let cmd = dsl::parse(line).unwrap();
        exec.execute(cmd).unwrap()
    }

    #[test]
    fn four_row_insert_select_fetch_print_scenario() {
        let config = Config::default();
        let catalog = Catalog::open(config).unwrap();
        let mut exec = Executor::new(catalog);

        run(&mut exec, r#"create(db,"d")"#);
        run(&mut exec, r#"create(tbl,"t",d,2)"#);
        run(&mut exec, r#"create(col,"a",d.t)"#);
        run(&mut exec, r#"create(col,"b",d.t)"#);
        run(&mut exec, "relational_insert(d.t,1,10)");
        run(&mut exec, "relational_insert(d.t,2,20)");
        run(&mut exec, "relational_insert(d.t,3,30)");
        run(&mut exec, "relational_insert(d.t,4,40)");
        run(&mut exec, "p=select(d.t.a,2,3)");
        run(&mut exec, "r=fetch(d.t.b,p)");
        let status = run(&mut exec, "print(r)");
        assert_eq!(status, StatusCode::OkPrint("20\n30".to_string()));
    }

    #[test]
    fn batch_mode_rejects_writes() {
        let config = Config::default();
        let catalog = Catalog::open(config).unwrap();
        let mut exec = Executor::new(catalog);
        run(&mut exec, r#"create(db,"d")"#);
        run(&mut exec, r#"create(tbl,"t",d,1)"#);
        run(&mut exec, r#"create(col,"a",d.t)"#);
        run(&mut exec, "relational_insert(d.t,1)");
        run(&mut exec, "batch_queries");
        let cmd = dsl::parse("relational_insert(d.t,2)").unwrap();
        assert!(exec.execute(cmd).is_err());
    }
}

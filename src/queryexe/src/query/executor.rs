use crate::channel::{CancelHandle, Sink, Source};
use crate::interpreter::Interpreter;
use crate::opiterator::*;
use crate::scalar::ScalarCompiler;
use common::catalog::Catalog;
use common::logical_plan::*;
use common::table::*;
use common::{Attribute, DataType, FlowError, QueryResult, Row, TableSchema};
use std::any::Any;
use std::collections::HashSet;
use std::panic;
use std::thread::{self, JoinHandle};

/// One operator of a physical plan with its channels already connected.
struct Task {
    node: OpIndex,
    op: Box<dyn Operator>,
    inputs: Vec<Source>,
    sink: Sink,
}

/// Operators of one query, wired together and ready to run.
pub struct PhysicalPlan {
    /// Operators in the order they were registered, leaves first.
    tasks: Vec<Task>,
    /// Output of the root operator.
    output: Source,
    /// Schema of the root operator's rows.
    schema: TableSchema,
    cancel: CancelHandle,
}

impl PhysicalPlan {
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Number of operators in the plan.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

/// A started worker thread.
struct Worker {
    name: String,
    handle: JoinHandle<Result<(), FlowError>>,
}

/// Manages the execution of queries: converts a LogicalPlan into connected
/// operators, runs each operator on its own thread and reads the root output.
pub struct Executor {
    /// Configured plan, until started.
    plan: Option<PhysicalPlan>,
    /// Output of the running plan.
    output: Option<Source>,
    /// Schema of the configured plan.
    schema: Option<TableSchema>,
    cancel: Option<CancelHandle>,
    workers: Vec<Worker>,
}

impl Executor {
    /// Initializes an executor with no query.
    pub fn new_ref() -> Self {
        Self {
            plan: None,
            output: None,
            schema: None,
            cancel: None,
            workers: Vec::new(),
        }
    }

    /// Sets the plan the next [`Executor::start`] runs.
    pub fn configure_query(&mut self, physical_plan: PhysicalPlan) {
        self.schema = Some(physical_plan.schema.clone());
        self.cancel = Some(physical_plan.cancel.clone());
        self.plan = Some(physical_plan);
    }

    /// Handle that aborts the configured query from any thread.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.cancel.clone()
    }

    /// Spawns one thread per operator.
    ///
    /// A worker that fails for any reason but cancellation cancels the whole
    /// query, so no other worker stays blocked on it.
    pub fn start(&mut self) -> Result<(), FlowError> {
        let plan = self
            .plan
            .take()
            .ok_or_else(|| FlowError::ExecutionError(String::from("No query configured")))?;
        info!("starting query with {} operators", plan.tasks.len());
        self.output = Some(plan.output);
        for task in plan.tasks {
            let name = format!("{}-{}", task.op.name(), task.node);
            let cancel = plan.cancel.clone();
            let worker_name = name.clone();
            let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
                let res = task.op.run(task.inputs, task.sink);
                match &res {
                    Ok(()) => debug!("{} finished", worker_name),
                    Err(e) if e.is_cancelled() => debug!("{} cancelled", worker_name),
                    Err(e) => {
                        error!("{} failed: {}", worker_name, e);
                        cancel.cancel();
                    }
                }
                res
            });
            match spawned {
                Ok(handle) => self.workers.push(Worker { name, handle }),
                Err(e) => {
                    plan.cancel.cancel();
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Returns the next row or None once the root operator has finished.
    pub fn next(&mut self) -> Result<Option<Row>, FlowError> {
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| FlowError::ExecutionError(String::from("Query not started")))?;
        let row = output.receive()?;
        if row.is_end_of_stream() {
            Ok(None)
        } else {
            Ok(Some(row))
        }
    }

    /// Stops the query and waits for every worker.
    ///
    /// Closing before the output is drained cancels the remaining work. Returns
    /// the first worker failure other than cancellation. A worker panic is
    /// resumed on the calling thread once every worker has been joined.
    pub fn close(&mut self) -> Result<(), FlowError> {
        let cancel = match &self.cancel {
            Some(cancel) => cancel.clone(),
            None => return Ok(()),
        };
        let cancelled_before = cancel.is_cancelled();
        let drained = self.output.as_ref().map_or(true, |o| o.is_finished());
        if !drained {
            debug!("closing query before its output was drained");
            cancel.cancel();
        }

        let mut failure: Option<FlowError> = None;
        let mut saw_cancel = false;
        let mut panicked: Option<Box<dyn Any + Send>> = None;
        for worker in self.workers.drain(..) {
            match worker.handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(FlowError::Cancelled)) => saw_cancel = true,
                Ok(Err(e)) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                Err(payload) => {
                    error!("worker {} panicked", worker.name);
                    if panicked.is_none() {
                        panicked = Some(payload);
                    }
                }
            }
        }
        self.output = None;
        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
        match failure {
            Some(e) => Err(e),
            None if saw_cancel && cancelled_before => Err(FlowError::Cancelled),
            None => Ok(()),
        }
    }

    /// Runs the configured query to completion and collects its rows.
    pub fn execute(&mut self) -> Result<QueryResult, FlowError> {
        let schema = self
            .schema
            .clone()
            .ok_or_else(|| FlowError::ExecutionError(String::from("No query configured")))?;
        self.start()?;
        let mut rows = Vec::new();
        let drained = loop {
            match self.next() {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        // A worker failure explains a cancelled read better than the read does.
        self.close()?;
        drained?;
        info!("query returned {} rows", rows.len());
        Ok(QueryResult::new(schema, rows))
    }

    /// Converts a logical plan into a physical plan of connected operators.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Catalog of the database containing the tables to scan.
    /// * `lp` - Logical plan of the query.
    pub fn logical_plan_to_physical_plan<T: Catalog>(
        catalog: &T,
        lp: &LogicalPlan,
    ) -> Result<PhysicalPlan, FlowError> {
        let root = lp
            .root()
            .ok_or_else(|| FlowError::ExecutionError(String::from("No root node")))?;
        let mut interpreter = Interpreter::new(lp);
        let mut tasks = Vec::new();
        let mut visited = HashSet::new();
        let schema = Self::logical_plan_to_physical_plan_helper(
            catalog,
            lp,
            root,
            &mut interpreter,
            &mut tasks,
            &mut visited,
        )?;
        let output = interpreter.output(root);
        debug!("built physical plan with {} operators", tasks.len());
        Ok(PhysicalPlan {
            tasks,
            output,
            schema,
            cancel: interpreter.cancel_handle(),
        })
    }

    /// Recursive helper to convert a logical plan into operators.
    ///
    /// Converts every input of `start` before `start` itself, so each input's
    /// output channel is registered before `start` reads from it. Returns the
    /// schema of `start`'s output.
    fn logical_plan_to_physical_plan_helper<T: Catalog>(
        catalog: &T,
        lp: &LogicalPlan,
        start: OpIndex,
        interpreter: &mut Interpreter,
        tasks: &mut Vec<Task>,
        visited: &mut HashSet<OpIndex>,
    ) -> Result<TableSchema, FlowError> {
        let err = FlowError::ValidationError(String::from("Malformed logical plan"));
        if !visited.insert(start) {
            return Err(FlowError::ValidationError(format!(
                "node {} feeds more than one consumer",
                start
            )));
        }

        let op = lp.get_operator(start).ok_or_else(|| err.clone())?;
        let children: Vec<OpIndex> = lp.edges(start).collect();
        if children.len() != op.input_count() {
            return Err(err);
        }
        let mut input_schemas = Vec::new();
        for child in children {
            input_schemas.push(Self::logical_plan_to_physical_plan_helper(
                catalog,
                lp,
                child,
                interpreter,
                tasks,
                visited,
            )?);
        }

        let (operator, schema): (Box<dyn Operator>, TableSchema) = match op {
            LogicalOp::Scan(ScanNode { alias }) => {
                let table_id = Table::get_table_id(alias);
                let schema = catalog.get_table_schema(table_id)?;
                let rows = catalog.get_table_rows(table_id)?;
                (Box::new(ValuesOp::new(rows)), schema)
            }
            LogicalOp::Values(ValuesNode { schema, rows }) => {
                if let Some(bad) = rows.iter().find(|r| r.size() != schema.size()) {
                    return Err(FlowError::ValidationError(format!(
                        "values row {} does not match {}",
                        bad,
                        schema.digest()
                    )));
                }
                (Box::new(ValuesOp::new(rows.clone())), schema.clone())
            }
            LogicalOp::Filter(FilterNode { condition }) => {
                let input = input_schemas.remove(0);
                let condition = ScalarCompiler::with_input(&input).compile(condition);
                (Box::new(FilterOp::new(condition)), input)
            }
            LogicalOp::Project(project) => {
                let input = input_schemas.remove(0);
                let compiler = ScalarCompiler::with_input(&input);
                let exprs = project.exprs.iter().map(|e| compiler.compile(e)).collect();
                let attrs = project
                    .exprs
                    .iter()
                    .enumerate()
                    .map(|(i, e)| {
                        let dtype = e.data_type(&input).unwrap_or(DataType::Null);
                        Attribute::new(project.name(i), dtype)
                    })
                    .collect();
                (Box::new(ProjectOp::new(exprs)), TableSchema::new(attrs))
            }
            LogicalOp::Join(JoinNode { condition }) => {
                let schema = input_schemas[0].merge(&input_schemas[1]);
                let condition = ScalarCompiler::with_input(&schema).compile(condition);
                (Box::new(NestedLoopJoinOp::new(condition)), schema)
            }
            LogicalOp::Union(_) => {
                if input_schemas[0].size() != input_schemas[1].size() {
                    return Err(FlowError::ValidationError(format!(
                        "union inputs {} and {} differ in width",
                        input_schemas[0].digest(),
                        input_schemas[1].digest()
                    )));
                }
                (Box::new(UnionOp), input_schemas.remove(0))
            }
        };

        let sink = interpreter.sink(start);
        let inputs = (0..operator.input_count())
            .map(|i| interpreter.source(start, i))
            .collect();
        tasks.push(Task {
            node: start,
            op: operator,
            inputs,
            sink,
        });
        Ok(schema)
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.handle.join();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::database::Database;
    use common::rex::{RexNode, RexOp};
    use common::testutil::*;
    use common::Value;

    const TABLE_A: &str = "A";
    const TABLE_B: &str = "B";

    fn test_db() -> Database {
        let db = Database::new(String::from("test"));
        db.add_table(Table::with_rows(
            String::from(TABLE_A),
            int_str_schema(),
            vec![int_str_row(1, "a"), int_str_row(2, "b")],
        ));
        db.add_table(Table::with_rows(
            String::from(TABLE_B),
            get_int_table_schema(2),
            create_row_list(vec![vec![2, 20], vec![1, 10], vec![3, 30]]),
        ));
        db
    }

    fn scan(lp: &mut LogicalPlan, alias: &str) -> OpIndex {
        lp.add_node(LogicalOp::Scan(ScanNode {
            alias: alias.to_string(),
        }))
    }

    fn eq(left: RexNode, right: RexNode) -> RexNode {
        RexNode::call(RexOp::Equals, vec![left, right])
    }

    /// Scan A -> Filter $0 = 1 -> Project $1.
    fn filter_project_plan() -> LogicalPlan {
        let mut lp = LogicalPlan::new();
        let s = scan(&mut lp, TABLE_A);
        let f = lp.add_node(LogicalOp::Filter(FilterNode {
            condition: eq(RexNode::input_ref(0), RexNode::literal(Value::Int(1))),
        }));
        let p = lp.add_node(LogicalOp::Project(ProjectNode {
            exprs: vec![RexNode::input_ref(1)],
            names: vec![String::from("name")],
        }));
        lp.add_edge(f, s);
        lp.add_edge(p, f);
        lp
    }

    fn run(db: &Database, lp: &LogicalPlan) -> Result<QueryResult, FlowError> {
        let plan = Executor::logical_plan_to_physical_plan(db, lp)?;
        let mut executor = Executor::new_ref();
        executor.configure_query(plan);
        executor.execute()
    }

    #[test]
    fn test_filter_project() {
        init();
        let res = run(&test_db(), &filter_project_plan()).unwrap();
        assert_eq!(res.rows(), &[Row::new(vec![Value::String("a".into())])]);
        assert_eq!(res.schema().digest(), "RecordType(VARCHAR name)");
    }

    #[test]
    fn test_filter_random_rows() {
        let db = test_db();
        let rows = gen_random_rows(200, 20);
        db.add_table(Table::with_rows(String::from("rand"), int_str_schema(), rows.clone()));
        let mut lp = LogicalPlan::new();
        let s = scan(&mut lp, "rand");
        let f = lp.add_node(LogicalOp::Filter(FilterNode {
            condition: RexNode::call(
                RexOp::LessThan,
                vec![RexNode::input_ref(0), RexNode::literal(Value::Int(5))],
            ),
        }));
        lp.add_edge(f, s);
        let res = run(&db, &lp).unwrap();
        let expected: Vec<Row> = rows
            .into_iter()
            .filter(|r| r.get_field(0).unwrap().unwrap_int() < 5)
            .collect();
        assert!(compare_unordered_rows(res.rows(), expected));
    }

    #[test]
    fn test_join() {
        let mut lp = LogicalPlan::new();
        let a = scan(&mut lp, TABLE_A);
        let b = scan(&mut lp, TABLE_B);
        let j = lp.add_node(LogicalOp::Join(JoinNode {
            condition: eq(RexNode::input_ref(0), RexNode::input_ref(2)),
        }));
        lp.add_edge(j, a);
        lp.add_edge(j, b);
        let res = run(&test_db(), &lp).unwrap();
        assert_eq!(res.schema().size(), 4);
        let joined: Vec<(i64, i64)> = res
            .rows()
            .iter()
            .map(|r| {
                let id = r.get_field(0).unwrap().unwrap_int();
                let other = r.get_field(3).unwrap().unwrap_int();
                (id, other)
            })
            .collect();
        assert_eq!(joined, vec![(1, 10), (2, 20)]);
    }

    #[test]
    fn test_union_of_values() {
        let schema = get_int_table_schema(1);
        let mut lp = LogicalPlan::new();
        let first = lp.add_node(LogicalOp::Values(ValuesNode {
            schema: schema.clone(),
            rows: create_row_list(vec![vec![1], vec![2]]),
        }));
        let second = lp.add_node(LogicalOp::Values(ValuesNode {
            schema,
            rows: create_row_list(vec![vec![3]]),
        }));
        let u = lp.add_node(LogicalOp::Union(UnionNode {}));
        lp.add_edge(u, first);
        lp.add_edge(u, second);
        let res = run(&test_db(), &lp).unwrap();
        assert_eq!(res.rows(), &create_row_list(vec![vec![1], vec![2], vec![3]])[..]);
    }

    #[test]
    fn test_union_width_mismatch() {
        let mut lp = LogicalPlan::new();
        let a = scan(&mut lp, TABLE_A);
        let v = lp.add_node(LogicalOp::Values(ValuesNode {
            schema: get_int_table_schema(1),
            rows: vec![],
        }));
        let u = lp.add_node(LogicalOp::Union(UnionNode {}));
        lp.add_edge(u, a);
        lp.add_edge(u, v);
        assert!(matches!(
            Executor::logical_plan_to_physical_plan(&test_db(), &lp),
            Err(FlowError::ValidationError(_))
        ));
    }

    #[test]
    fn test_values_row_width_mismatch() {
        let mut lp = LogicalPlan::new();
        lp.add_node(LogicalOp::Values(ValuesNode {
            schema: get_int_table_schema(2),
            rows: create_row_list(vec![vec![1]]),
        }));
        assert!(matches!(
            Executor::logical_plan_to_physical_plan(&test_db(), &lp),
            Err(FlowError::ValidationError(_))
        ));
    }

    #[test]
    fn test_unknown_table() {
        let mut lp = LogicalPlan::new();
        scan(&mut lp, "missing");
        assert!(Executor::logical_plan_to_physical_plan(&test_db(), &lp).is_err());
    }

    #[test]
    fn test_missing_input_is_malformed() {
        let mut lp = LogicalPlan::new();
        lp.add_node(LogicalOp::Filter(FilterNode {
            condition: RexNode::literal(Value::Bool(true)),
        }));
        assert_eq!(
            Executor::logical_plan_to_physical_plan(&test_db(), &lp).err(),
            Some(FlowError::ValidationError(String::from("Malformed logical plan")))
        );
    }

    #[test]
    fn test_shared_input_rejected() {
        let mut lp = LogicalPlan::new();
        let a = scan(&mut lp, TABLE_A);
        let u = lp.add_node(LogicalOp::Union(UnionNode {}));
        lp.add_edge(u, a);
        lp.add_edge(u, a);
        assert!(matches!(
            Executor::logical_plan_to_physical_plan(&test_db(), &lp),
            Err(FlowError::ValidationError(_))
        ));
    }

    #[test]
    fn test_next_not_started() {
        let mut executor = Executor::new_ref();
        assert!(executor.next().is_err());
        assert!(executor.start().is_err());
        assert!(executor.close().is_ok());
    }

    #[test]
    fn test_next_then_early_close() {
        let db = test_db();
        let plan = Executor::logical_plan_to_physical_plan(&db, &filter_project_plan()).unwrap();
        assert_eq!(plan.task_count(), 3);
        let mut executor = Executor::new_ref();
        executor.configure_query(plan);
        executor.start().unwrap();
        assert!(executor.next().unwrap().is_some());
        executor.close().unwrap();
        assert!(executor.next().is_err());
    }

    #[test]
    fn test_external_cancel() {
        let db = test_db();
        let rows: Vec<Row> = (0..1000).map(|i| int_str_row(i, "x")).collect();
        db.add_table(Table::with_rows(String::from("big"), int_str_schema(), rows));
        let mut lp = LogicalPlan::new();
        scan(&mut lp, "big");
        let plan = Executor::logical_plan_to_physical_plan(&db, &lp).unwrap();
        let mut executor = Executor::new_ref();
        executor.configure_query(plan);
        executor.start().unwrap();
        assert!(executor.next().unwrap().is_some());
        executor.cancel_handle().unwrap().cancel();
        assert_eq!(executor.next(), Err(FlowError::Cancelled));
        assert_eq!(executor.close(), Err(FlowError::Cancelled));
    }

    #[test]
    #[should_panic(expected = "out of range for a row of 1 fields")]
    fn test_worker_panic_reaches_caller() {
        let db = test_db();
        db.add_table(Table::with_rows(
            String::from("short"),
            int_str_schema(),
            create_row_list(vec![vec![1]]),
        ));
        let mut lp = LogicalPlan::new();
        let s = scan(&mut lp, "short");
        let p = lp.add_node(LogicalOp::Project(ProjectNode {
            exprs: vec![RexNode::input_ref(1)],
            names: vec![],
        }));
        lp.add_edge(p, s);
        let _ = run(&db, &lp);
    }

    #[test]
    fn test_worker_error_fails_query() {
        // The root output is taken and dropped, so the root operator's first
        // send fails and cancels the rest of the plan.
        let db = test_db();
        let mut plan =
            Executor::logical_plan_to_physical_plan(&db, &filter_project_plan()).unwrap();
        let (_idle, detached) = crate::channel::channel(&plan.cancel);
        drop(std::mem::replace(&mut plan.output, detached));
        let mut executor = Executor::new_ref();
        executor.configure_query(plan);
        executor.start().unwrap();
        assert!(executor.next().is_err());
        assert!(matches!(executor.close(), Err(FlowError::ExecutionError(_))));
    }
}

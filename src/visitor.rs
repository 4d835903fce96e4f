//! The aggregation engine: one post-order traversal of the component tree.
//!
//! For every node and every registered formula the executor creates a fresh
//! counter, fills it either from leaf raw data (FILE nodes) or by merging
//! the counters of already-processed children, asks the formula for output
//! measures, and writes whatever is produced into the measure repository.
//! Counters never outlive their node; the only state flowing upward is the
//! explicit merge into the parent's counter.

use log::{debug, trace};

use crate::component::Component;
use crate::formula::{Counter, CreateMeasureContext, FileAggregateContext, Formula};
use crate::metric::MetricDirectory;
use crate::period::Period;
use crate::report::ReportReader;
use crate::repository::MeasureRepository;
use crate::Result;

/// Object-safe driver for one formula during one traversal.
///
/// Holds the typed counter stack internally so the executor can run a
/// heterogeneous list of formulas over a single shared walk.
trait FormulaExecution {
    fn enter(&mut self);
    fn aggregate_file(&mut self, context: &mut FileAggregateContext<'_, '_>) -> Result<()>;
    fn leave(
        &mut self,
        component: &Component,
        periods: &[Period],
        metrics: &MetricDirectory,
        repository: &mut MeasureRepository<'_>,
    ) -> Result<()>;
}

struct Execution<'f, F: Formula> {
    formula: &'f F,
    stack: Vec<F::Counter>,
}

impl<'f, F: Formula> FormulaExecution for Execution<'f, F> {
    fn enter(&mut self) {
        self.stack.push(self.formula.create_counter());
    }

    fn aggregate_file(&mut self, context: &mut FileAggregateContext<'_, '_>) -> Result<()> {
        let counter = self
            .stack
            .last_mut()
            .expect("counter stack is empty outside a traversal");
        counter.aggregate_file(context)
    }

    fn leave(
        &mut self,
        component: &Component,
        periods: &[Period],
        metrics: &MetricDirectory,
        repository: &mut MeasureRepository<'_>,
    ) -> Result<()> {
        let counter = self
            .stack
            .pop()
            .expect("counter stack is empty outside a traversal");

        for &key in self.formula.output_metric_keys() {
            let metric = metrics.by_key(key)?;
            let context = CreateMeasureContext::new(component, periods, metric);
            if let Some(measure) = self.formula.create_measure(&counter, &context)? {
                repository.add(component, metric, measure)?;
            }
        }

        if let Some(parent) = self.stack.last_mut() {
            parent.aggregate(&counter);
        }
        Ok(())
    }
}

/// Runs a list of formulas over one post-order traversal of the tree.
///
/// Formulas are registered with [`FormulaExecutor::with_formula`] and run
/// independently of each other; new formulas plug in without touching the
/// traversal.
pub struct FormulaExecutor<'a> {
    metrics: &'a MetricDirectory,
    periods: &'a [Period],
    reader: &'a dyn ReportReader,
    executions: Vec<Box<dyn FormulaExecution + 'a>>,
}

impl<'a> FormulaExecutor<'a> {
    pub fn new(metrics: &'a MetricDirectory, periods: &'a [Period], reader: &'a dyn ReportReader) -> Self {
        Self {
            metrics,
            periods,
            reader,
            executions: Vec::new(),
        }
    }

    /// Register a formula to run during the traversal.
    pub fn with_formula<F>(mut self, formula: &'a F) -> Self
    where
        F: Formula + 'a,
        F::Counter: 'a,
    {
        self.executions.push(Box::new(Execution {
            formula,
            stack: Vec::new(),
        }));
        self
    }

    /// Walk the tree once, writing every produced measure into `repository`.
    pub fn visit(mut self, root: &Component, repository: &mut MeasureRepository<'_>) -> Result<()> {
        debug!(
            "visiting component tree from {} with {} formula(s) and {} period(s)",
            root.reference(),
            self.executions.len(),
            self.periods.len()
        );
        self.visit_node(root, repository)
    }

    fn visit_node(&mut self, node: &Component, repository: &mut MeasureRepository<'_>) -> Result<()> {
        trace!("entering component {}", node.reference());
        for execution in &mut self.executions {
            execution.enter();
        }

        if node.is_leaf() {
            let mut context =
                FileAggregateContext::new(node, self.periods, self.reader, self.metrics, repository);
            for execution in &mut self.executions {
                execution.aggregate_file(&mut context)?;
            }
        } else {
            for child in node.children() {
                self.visit_node(child, repository)?;
            }
        }

        for execution in &mut self.executions {
            execution.leave(node, self.periods, self.metrics, repository)?;
        }
        trace!("leaving component {}", node.reference());
        Ok(())
    }
}

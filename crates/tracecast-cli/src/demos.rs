//! Demo simulators.
//!
//! Each simulator is written once against [`StepSink`] and runs unchanged in
//! batch mode ([`TraceRecorder`]) or live mode ([`LiveRecorder`]). A `Break`
//! from the sink means the run was cancelled; simulators unwind without
//! emitting anything further.

use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracecast_core::Priority;
use tracecast_playback::{LiveRecorder, TraceRecorder};

/// Where a simulator sends its steps.
#[async_trait]
pub trait StepSink: Send {
    async fn step(&mut self, payload: Value, label: String, priority: Priority)
    -> ControlFlow<()>;
}

#[async_trait]
impl StepSink for TraceRecorder {
    async fn step(
        &mut self,
        payload: Value,
        label: String,
        priority: Priority,
    ) -> ControlFlow<()> {
        self.emit_step(payload, label, Some(priority))
    }
}

#[async_trait]
impl StepSink for LiveRecorder {
    async fn step(
        &mut self,
        payload: Value,
        label: String,
        priority: Priority,
    ) -> ControlFlow<()> {
        self.emit_step(payload, label, Some(priority)).await
    }
}

/// A runnable demo and its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Algorithm {
    BubbleSort(Vec<i64>),
    Factorial(u32),
}

impl Algorithm {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BubbleSort(_) => "bubble sort",
            Self::Factorial(_) => "factorial",
        }
    }

    /// Run to completion or cancellation.
    pub async fn run(&self, sink: &mut dyn StepSink) {
        match self {
            Self::BubbleSort(values) => {
                let _ = bubble_sort(sink, values.clone()).await;
            }
            Self::Factorial(n) => {
                let _ = factorial(sink, u64::from(*n), 0).await;
            }
        }
    }
}

/// Bubble sort, narrating every comparison and swap.
pub async fn bubble_sort(sink: &mut dyn StepSink, mut values: Vec<i64>) -> ControlFlow<()> {
    let n = values.len();
    sink.step(
        json!({ "array": values, "sorted": 0 }),
        format!("Sorting {n} values"),
        Priority::Normal,
    )
    .await?;

    for pass in 0..n.saturating_sub(1) {
        let mut swapped = false;
        for i in 0..n - 1 - pass {
            let (a, b) = (values[i], values[i + 1]);
            sink.step(
                json!({ "array": values, "compare": [i, i + 1], "sorted": pass }),
                format!("Compare {a} and {b}"),
                Priority::Normal,
            )
            .await?;

            if a > b {
                values.swap(i, i + 1);
                swapped = true;
                sink.step(
                    json!({ "array": values, "swap": [i, i + 1], "sorted": pass }),
                    format!("{a} is greater than {b}, swap them"),
                    Priority::Normal,
                )
                .await?;
            }
        }
        if !swapped {
            break;
        }
    }

    sink.step(
        json!({ "array": values, "sorted": n }),
        "The array is sorted".to_string(),
        Priority::High,
    )
    .await?;
    ControlFlow::Continue(())
}

/// Recursive factorial, narrating each call and each return.
///
/// The recursion goes through a boxed future so the depth is bounded by `n`
/// and not by the compiler's async state size.
pub fn factorial<'a>(
    sink: &'a mut dyn StepSink,
    n: u64,
    depth: usize,
) -> Pin<Box<dyn Future<Output = ControlFlow<(), u64>> + Send + 'a>> {
    Box::pin(async move {
        let frame = |phase: &str, result: Option<u64>| {
            json!({ "n": n, "depth": depth, "phase": phase, "result": result })
        };

        if n <= 1 {
            sink.step(frame("base", Some(1)), format!("factorial of {n} is 1"), Priority::Normal)
                .await?;
            return ControlFlow::Continue(1);
        }

        sink.step(
            frame("call", None),
            format!("factorial of {n} needs factorial of {}", n - 1),
            Priority::Normal,
        )
        .await?;

        let inner = factorial(&mut *sink, n - 1, depth + 1).await?;
        let result = n.saturating_mul(inner);

        let priority = if depth == 0 {
            Priority::High
        } else {
            Priority::Normal
        };
        sink.step(
            frame("return", Some(result)),
            format!("{n} times {inner} is {result}"),
            priority,
        )
        .await?;
        ControlFlow::Continue(result)
    })
}

//! Stress, cortisol and sleep, end to end.
//!
//! Run with: cargo run -p causalq-agents --example stress_sleep
//!
//! Set `RUST_LOG=debug` to watch the builder's state transitions.
//!
//! 1. Formalize the query with fixed answers (no language model needed)
//! 2. Identify the effect and estimate it on synthesized data
//! 3. Repeat on data drawn from the role model, whose true effect is known
//! 4. Show the retry loop discarding a cyclic candidate

use causalq_agents::{
    CompositeHook, FixedElicitor, LoggingHook, PipelineConfig, QueryPipeline, RetryPolicy,
    ScriptedElicitor,
};
use causalq_core::{ResponseBundle, RoleSpec, ROLE_MODEL_ATE};
use tracing_subscriber::EnvFilter;

const QUERY: &str = "Does stress affect sleep?";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== {} ===\n", QUERY);

    // -------------------------------------------------------------------------
    // 1-2. Synthesized data
    // -------------------------------------------------------------------------
    let pipeline = QueryPipeline::new(FixedElicitor::stress_sleep(), PipelineConfig::default())
        .with_hook(CompositeHook::new().with(LoggingHook::verbose()));
    let outcome = pipeline.run(QUERY).await?;

    println!("Graph:\n{}", outcome.formalized.graph.to_dot());
    let id = &outcome.effect.identification;
    println!("Identified by: {} ({:?})", id.kind(), id.confidence());
    println!("Backdoor set:  {:?}", id.sets.backdoor);
    println!("Frontdoor set: {:?}", id.sets.frontdoor);
    for (criterion, estimate) in &outcome.effect.estimates.by_criterion {
        match estimate {
            Some(value) => println!("  {:<10} {:>8.4}", criterion.name(), value),
            None => println!("  {:<10} {:>8}", criterion.name(), "n/a"),
        }
    }

    // -------------------------------------------------------------------------
    // 3. Role-model data
    // -------------------------------------------------------------------------
    let data = RoleSpec::stress_sleep().generate(5000, 42)?;
    let pipeline =
        QueryPipeline::new(FixedElicitor::stress_sleep(), PipelineConfig::default()).with_data(data);
    let outcome = pipeline.run(QUERY).await?;
    println!(
        "\nOn role-model data: estimate {:?}, true effect {}",
        outcome.effect(),
        ROLE_MODEL_ATE
    );

    // -------------------------------------------------------------------------
    // 4. Retry after a cycle
    // -------------------------------------------------------------------------
    let elicitor = ScriptedElicitor::new([
        ResponseBundle::new("A", "C", "B", "A -> B\nB -> C\nC -> A"),
        ResponseBundle::new("A", "C", "B", "A -> B\nB -> C"),
    ]);
    let config = PipelineConfig::default().with_retry(RetryPolicy::immediate(3));
    let outcome = QueryPipeline::new(elicitor, config)
        .with_hook(LoggingHook::new())
        .run("Does A affect C?")
        .await?;
    println!(
        "\nAccepted after {} attempt(s); path {}",
        outcome.formalized.attempt_count(),
        outcome.effect.identification.kind()
    );

    Ok(())
}

//! The identification cascade on four small graphs.
//!
//! Run with: cargo run -p causalq-prob --example identification_paths
//!
//! | Graph                        | Path      |
//! |------------------------------|-----------|
//! | observed confounder          | backdoor  |
//! | latent confounder + mediator | frontdoor |
//! | bare T -> Y                  | algebraic |
//! | latent confounder only       | arid SEM  |

use causalq_core::{CausalGraph, GraphSpec};
use causalq_prob::{infer_causal_effect, EstimationConfig, IdentificationConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let graphs = [
        (
            "observed confounder",
            GraphSpec::new("t", "y")
                .with_vars(["c"])
                .with_edges([("c", "t"), ("c", "y"), ("t", "y")]),
        ),
        (
            "latent confounder + mediator",
            GraphSpec::new("t", "y")
                .with_vars(["m"])
                .with_edges([("t", "m"), ("m", "y")])
                .with_unobserved(["u"], Some([("u", "t"), ("u", "y")])),
        ),
        (
            "bare T -> Y",
            GraphSpec::new("t", "y").with_edges([("t", "y")]),
        ),
        (
            "latent confounder only",
            GraphSpec::new("t", "y")
                .with_edges([("t", "y")])
                .with_unobserved(["u"], Some([("u", "t"), ("u", "y")])),
        ),
    ];

    let identification = IdentificationConfig::default();
    let estimation = EstimationConfig::default().with_sample_count(2000);

    for (label, spec) in graphs {
        let graph = CausalGraph::build(spec)?;
        let effect = infer_causal_effect(&graph, None, &identification, &estimation)?;
        let id = &effect.identification;

        println!("--- {} ---", label);
        println!("path:       {} ({:?})", id.kind(), id.confidence());
        if let Some(functional) = id.functional() {
            println!("functional: {}", functional);
        }
        println!("effect:     {:?}\n", effect.effect());
    }

    Ok(())
}

use ridge_search::*;
use ridge_types::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Synthetic scorer: rewards weights near 0.8 on the first two measures and
/// penalizes the rest.
fn synthetic_oracle(point: &Point, dataset: &DatasetHandle) -> anyhow::Result<SelectionResult> {
    let c = point.coordinates();
    let fit: f64 = c
        .iter()
        .enumerate()
        .map(|(i, w)| if i < 2 { 1.0 - (w - 0.8).abs() } else { -w.abs() * 0.5 })
        .sum();
    let score = (fit / c.len() as f64).clamp(0.0, 1.0);
    let selected = ((score * dataset.feature_count as f64).round() as usize).max(1);
    Ok(SelectionResult::new(point.clone(), score, selected))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let measures = MeasureSet::new(["spearman", "symmetric-uncertainty", "fit-criterion", "vdm"]);
    let dataset = DatasetHandle::new("arcene", 10_000, 200)?;
    println!("Dataset: {}", dataset);
    println!("Measures: {}", measures);

    let oracle: Arc<dyn Oracle> = Arc::new(synthetic_oracle);
    let kinds: [StrategyKind; 5] = [
        "basic".parse()?,
        "parallel".parse()?,
        "parallel-neighbors".parse()?,
        "priority".parse()?,
        "bandit".parse()?,
    ];

    for kind in kinds {
        let config = SearchConfig::new("demo", measures.clone())
            .with_threads(4)
            .with_budget(priority_budget(4, 20))
            .with_strategy(kind);
        let strategy = build_strategy(&config)?;
        let request = SearchRequest::from_config(format!("{}-{}", dataset.name, kind), &config, dataset.clone());

        let stats = strategy.run(&request, Arc::clone(&oracle))?;
        match stats.best_result() {
            Some(best) => println!("{:>20}: {}", strategy.name(), best),
            None => println!("{:>20}: nothing scored", strategy.name()),
        }
        println!("{}", serde_json::to_string_pretty(&stats.summary())?);
    }

    Ok(())
}

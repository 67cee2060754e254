//! Walkthrough of the whole engine on a small hand-built corpus.
//!
//! Usage: `cargo run --example similarity_report`
//!
//! Builds a corpus of tools, animals, and one deliberately ambiguous
//! robot dog, then prints codes, neighbor lists under both metrics, the
//! metric correlation, the disagreement outliers, and the projection
//! clusters.

use traitspace::{
    cosine_similarity, structural_similarity, unit_interval, CorpusBuilder, Embedding,
    EngineConfig, Layer, Method, Metric, SimilarityEngine, TraitVector,
};

fn corpus() -> traitspace::Result<CorpusBuilder> {
    // Codes: Physical | Functional | Abstract | Social, two hex chars each
    let coded: [(&str, u32, [f32; 4]); 9] = [
        ("hammer", 0xE0F0_0000, [0.9, 0.1, 0.0, 0.0]),
        ("mallet", 0xE0F0_0001, [0.85, 0.15, 0.0, 0.0]),
        ("screwdriver", 0xC0F8_0000, [0.8, 0.3, 0.1, 0.0]),
        ("wrench", 0xC0F0_0002, [0.82, 0.25, 0.05, 0.0]),
        ("cat", 0x1F03_00F8, [0.0, 0.1, 0.9, 0.3]),
        ("dog", 0x1F03_00FC, [0.05, 0.1, 0.85, 0.4]),
        ("wolf", 0x1F03_00F0, [0.0, 0.05, 0.95, 0.2]),
        // Animal-shaped code, machine-shaped embedding
        ("robot-dog", 0x1F03_00FD, [0.7, 0.4, 0.1, 0.1]),
        ("cloud", 0x0300_F800, [0.1, 0.0, 0.3, 0.0]),
    ];

    let mut builder = CorpusBuilder::new();
    for (id, raw, values) in coded {
        builder.set_code(id, TraitVector::from_raw(raw));
        builder.set_embedding(Embedding::new(id, values.to_vec()))?;
    }
    Ok(builder)
}

fn main() -> traitspace::Result<()> {
    let engine = SimilarityEngine::new(EngineConfig::default())?;
    let stats = engine.replace_corpus(corpus()?);

    println!("=== Traitspace similarity report ===");
    println!(
        "corpus v{}: {} entities, {} coded, {} embedded\n",
        stats.version, stats.total, stats.with_code, stats.with_embedding
    );

    // --- Structural codes ---
    println!("--- Structural codes ---");
    println!(
        "{:<12} {:>10} {:>5} {:>5} {:>5} {:>5}",
        "entity", "code", "Phy", "Fun", "Abs", "Soc"
    );
    let snapshot = engine.corpus();
    for (id, vector) in snapshot.coded() {
        let by_layer = vector.layer_activations();
        println!(
            "{:<12} {:>10} {:>5} {:>5} {:>5} {:>5}",
            id,
            vector.code().to_string(),
            by_layer[Layer::Physical.index()],
            by_layer[Layer::Functional.index()],
            by_layer[Layer::Abstract.index()],
            by_layer[Layer::Social.index()],
        );
    }

    // --- One pair under both metrics ---
    let dog = snapshot.code_of("dog")?;
    let wolf = snapshot.code_of("wolf")?;
    let cos = cosine_similarity(snapshot.embedding_of("dog")?, snapshot.embedding_of("wolf")?)?;
    println!("\n--- dog vs wolf ---");
    println!("structural: {:.3}", structural_similarity(dog, wolf));
    println!("semantic:   {:.3} (cosine {:.3})", unit_interval(cos), cos);

    // --- Neighbors of the ambiguous entity ---
    println!("\n--- robot-dog neighbors ---");
    for metric in [Metric::Structural, Metric::Semantic] {
        let list = engine.entity_neighbors("robot-dog", metric, 3)?;
        let ids: Vec<String> = list
            .iter()
            .map(|n| format!("{} ({:.3})", n.entity_id, n.score))
            .collect();
        println!("{:<11} {}", metric.name(), ids.join(", "));
    }
    let comparison = engine.neighbor_comparison("robot-dog", 3)?;
    println!(
        "overlap: {} of 3, jaccard {:.3}",
        comparison.overlap_count, comparison.jaccard
    );

    // --- Correlation between the metrics ---
    let report = engine.correlation_sample(100)?;
    println!("\n--- Metric correlation ---");
    println!(
        "{} of {} pairs sampled (seed {}), pearson r = {:.3}",
        report.sampled, report.population, report.seed, report.correlation
    );

    // --- Disagreement outliers ---
    let outliers = engine.outliers(0.2, 3)?;
    println!("\n--- Outliers (threshold 0.2) ---");
    for pair in &outliers.semantic_over_structural {
        println!(
            "semantic>structural  {} / {}  gap {:.3}",
            pair.entity_a, pair.entity_b, pair.disagreement
        );
    }
    for pair in &outliers.structural_over_semantic {
        println!(
            "structural>semantic  {} / {}  gap {:.3}",
            pair.entity_a, pair.entity_b, pair.disagreement
        );
    }

    // --- Projection clusters ---
    let job = engine.trigger_recompute(Method::Pca)?;
    job.wait();
    println!("\n--- PCA projection ({:?}) ---", engine.job_status(Method::Pca));
    for params in &engine.config().projection.resolutions {
        let clusters = engine.clusters(Method::Pca, params.level)?;
        println!(
            "level {} (eps {:.2}): {} clusters, {} noise",
            params.level,
            params.eps,
            clusters.clusters.len(),
            clusters.noise_count
        );
        for cluster in &clusters.clusters {
            let layer = cluster
                .dominant_layer
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  #{}: {} members at ({:+.2}, {:+.2}), dominant layer {}",
                cluster.cluster, cluster.size, cluster.centroid_x, cluster.centroid_y, layer
            );
        }
    }

    // --- Subset projection of just the tools ---
    let tools: Vec<String> = ["hammer", "mallet", "screwdriver", "wrench"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let subset = engine.subset_projection(&tools, Method::Pca)?;
    println!(
        "\nsubset of {} tools projected in {} ms",
        subset.projected, subset.elapsed_ms
    );

    Ok(())
}

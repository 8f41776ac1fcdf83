//! Getting started with geocluster
//!
//! Clusters a handful of markers at a few zoom levels, animates the transition
//! between two snapshots and renders a heat-map tile of the same data.
//!
//! Run with: RUST_LOG=debug cargo run --example getting_started

use geocluster::prelude::*;
use geocluster::{AlgorithmKind, ClusterAnimator, MarkerMover, Tile};
use std::error::Error;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    env_logger::init();
    println!("=== geocluster - Getting Started ===\n");

    // ========================================
    // 1. Distance clustering through the manager
    // ========================================
    println!("1. Distance clustering");
    println!("----------------------");

    let places = [
        ("Times Square", -73.9855, 40.7580),
        ("Bryant Park", -73.9832, 40.7536),
        ("Grand Central", -73.9772, 40.7527),
        ("Central Park", -73.9654, 40.7829),
        ("Brooklyn Bridge", -73.9969, 40.7061),
        ("Statue of Liberty", -74.0445, 40.6892),
        ("Boston Common", -71.0655, 42.3550),
    ];
    let markers: Vec<Marker> = places
        .iter()
        .enumerate()
        .map(|(id, (title, lng, lat))| {
            Marker::new(id as u64, Point::new(*lng, *lat)).with_title(*title)
        })
        .collect();

    let manager = ClusterManager::new();
    manager.add_items(markers.clone());

    let mut camera = CameraPosition::new(Point::new(-73.0, 41.5), 5.0);
    let viewport = ViewportSize::default();
    let mut previous = Vec::new();
    for update in [
        r#"{"type": "zoom_to", "zoom": 5}"#,
        r#"{"type": "zoom_by", "amount": 6}"#,
        r#"{"type": "zoom_in"}"#,
    ] {
        camera = camera.apply(&CameraUpdate::from_json(update)?, viewport)?;
        let Some(clusters) = manager.on_camera_idle(&camera) else {
            continue;
        };
        println!("   zoom {:>4.1}: {} clusters", camera.zoom, clusters.len());
        for cluster in &clusters {
            let titles: Vec<&str> = cluster
                .items()
                .into_iter()
                .filter_map(|marker| marker.title())
                .collect();
            println!(
                "     ({:.4}, {:.4}) x{} {:?}",
                cluster.position().x(),
                cluster.position().y(),
                cluster.size(),
                titles
            );
        }
        previous = clusters;
    }
    println!();

    // ========================================
    // 2. Animating markers out of their clusters
    // ========================================
    println!("2. Cluster animation");
    println!("--------------------");

    let mover: MarkerMover<Marker> = Arc::new(|marker: &Marker, at: Point| {
        log::debug!("marker {} at ({:.5}, {:.5})", marker.id, at.x(), at.y());
    });
    let mut animator = ClusterAnimator::new(mover);
    for cluster in &previous {
        for marker in cluster.items() {
            // Each marker starts from its cluster center.
            let start = Marker::new(marker.id, cluster.position());
            animator.add_marker(start, marker.position);
        }
    }
    println!("   Animating {} markers", animator.pending());
    animator
        .animate(ZoomDirection::In, &CancellationToken::new())
        .await;
    println!("   Done, {} pending\n", animator.pending());

    // ========================================
    // 3. Grid clustering from configuration
    // ========================================
    println!("3. Grid clustering from JSON configuration");
    println!("------------------------------------------");

    let config = Config::from_json(r#"{"clustering": {"algorithm": "grid", "max_distance": 200}}"#)?;
    assert_eq!(config.clustering.algorithm, AlgorithmKind::Grid);
    let grid = ClusterManager::with_config(&config)?;
    grid.add_items(markers.clone());
    for zoom in [3.0, 8.0, 13.0] {
        println!("   zoom {:>4.1}: {} clusters", zoom, grid.cluster(zoom).len());
    }
    println!();

    // ========================================
    // 4. Heat-map tiles
    // ========================================
    println!("4. Heat-map tiles");
    println!("-----------------");

    let data: Vec<WeightedLatLng> = markers
        .iter()
        .enumerate()
        .map(|(i, marker)| WeightedLatLng::new(marker.position, 1.0 + i as f64))
        .collect();
    let provider = HeatmapTileProvider::builder()
        .weighted_data(data)
        .config(config.heatmap.clone())
        .build()?;

    for (x, y, zoom) in [(150, 192, 9), (0, 0, 9)] {
        match provider.get_tile(x, y, zoom) {
            Tile::NoTile => println!("   tile ({}, {}, {}): no data", x, y, zoom),
            Tile::Image { size, pixels } => {
                let painted = pixels.iter().filter(|&&p| p != 0).count();
                println!(
                    "   tile ({}, {}, {}): {}x{} pixels, {} painted",
                    x, y, zoom, size, size, painted
                );
            }
        }
    }

    println!("\n=== Done ===");
    Ok(())
}

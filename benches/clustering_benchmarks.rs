use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geo::{Coord, Point};
use geocluster::{
    Algorithm, Bounds, GridBasedAlgorithm, HeatmapTileProvider, Marker,
    NonHierarchicalDistanceBasedAlgorithm, PointItem, PointQuadTree, PreCachingAlgorithmDecorator,
    WeightedLatLng,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
struct Pin(Coord);

impl PointItem for Pin {
    fn point(&self) -> Coord {
        self.0
    }
}

/// Markers scattered over the New York area on a deterministic lattice.
fn markers(count: u64) -> Vec<Marker> {
    (0..count)
        .map(|i| {
            let lng = -74.3 + (i % 317) as f64 * 0.002;
            let lat = 40.5 + (i % 211) as f64 * 0.0025 + (i / 1000) as f64 * 0.0001;
            Marker::new(i, Point::new(lng, lat))
        })
        .collect()
}

fn benchmark_distance_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_clustering");

    for size in [1_000u64, 10_000] {
        let algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        algorithm.add_items(markers(size));

        for zoom in [4.0f32, 10.0, 16.0] {
            group.bench_with_input(
                BenchmarkId::new(format!("zoom_{}", zoom), size),
                &zoom,
                |b, &zoom| {
                    b.iter(|| algorithm.get_clusters(black_box(zoom), &CancellationToken::new()))
                },
            );
        }
    }

    group.finish();
}

fn benchmark_grid_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_clustering");

    for size in [1_000u64, 10_000] {
        let algorithm = GridBasedAlgorithm::new();
        algorithm.add_items(markers(size));

        group.bench_with_input(BenchmarkId::new("zoom_10", size), &size, |b, &_size| {
            b.iter(|| algorithm.get_clusters(black_box(10.0), &CancellationToken::new()))
        });
    }

    group.finish();
}

fn benchmark_precache_hits(c: &mut Criterion) {
    let mut group = c.benchmark_group("precache");

    let decorator =
        PreCachingAlgorithmDecorator::new(Box::new(NonHierarchicalDistanceBasedAlgorithm::new()));
    decorator.add_items(markers(10_000));
    decorator.get_clusters(10.0, &CancellationToken::new());

    group.bench_function("cached_zoom", |b| {
        b.iter(|| decorator.get_clusters(black_box(10.0), &CancellationToken::new()))
    });

    group.finish();
}

fn benchmark_quad_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("quad_tree");

    let pins: Vec<Pin> = (0..10_000)
        .map(|i| {
            Pin(Coord {
                x: (i % 100) as f64 / 100.0,
                y: (i / 100) as f64 / 100.0,
            })
        })
        .collect();

    group.bench_function("insert_10k", |b| {
        b.iter(|| {
            let mut tree = PointQuadTree::new(Bounds::new(0.0, 1.0, 0.0, 1.0));
            for pin in &pins {
                tree.add(black_box(pin.clone()));
            }
            tree
        })
    });

    let mut tree = PointQuadTree::new(Bounds::new(0.0, 1.0, 0.0, 1.0));
    for pin in &pins {
        tree.add(pin.clone());
    }
    for span in [0.01, 0.1, 0.5] {
        let query = Bounds::from_span(Coord { x: 0.5, y: 0.5 }, span);
        group.bench_with_input(BenchmarkId::new("search", span), &query, |b, query| {
            b.iter(|| tree.search(black_box(query)))
        });
    }

    group.finish();
}

fn benchmark_heatmap_tiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("heatmap");
    group.sample_size(20);

    let data: Vec<WeightedLatLng> = markers(5_000)
        .into_iter()
        .enumerate()
        .map(|(i, marker)| WeightedLatLng::new(marker.position, 1.0 + (i % 5) as f64))
        .collect();
    let provider = HeatmapTileProvider::builder()
        .weighted_data(data)
        .build()
        .unwrap();

    // Tile containing Manhattan at zoom 10.
    group.bench_function("tile_zoom_10", |b| {
        b.iter(|| provider.get_tile(black_box(301), black_box(385), black_box(10)))
    });

    for radius in [10, 50] {
        let mut provider = HeatmapTileProvider::builder()
            .data(vec![Point::new(-74.0, 40.7)])
            .build()
            .unwrap();
        provider.set_radius(radius).unwrap();
        group.bench_with_input(BenchmarkId::new("single_point", radius), &radius, |b, _| {
            b.iter(|| provider.get_tile(black_box(301), black_box(385), black_box(10)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_distance_clustering,
    benchmark_grid_clustering,
    benchmark_precache_hits,
    benchmark_quad_tree,
    benchmark_heatmap_tiles
);

criterion_main!(benches);

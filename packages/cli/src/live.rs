//! Live views over the per-category subscriptions.
//!
//! Each view shows a [`CategoryProgress`] bar until every category has
//! reported once, then re-render on each update until Ctrl-C (or after the
//! first render with `--once`).

use mangrove_cli_utils::{CategoryProgress, MultiProgress};
use mangrove_map::{AggregateSubscription, MapScreen, MapState, navigation_url};
use mangrove_map_models::ClusterNode;
use mangrove_record::{RecordEntry, RecordLists, Summary};
use mangrove_record_models::Category;
use mangrove_store::{RealtimeStore, SnapshotEvent};

/// Waits for the next event, or `None` on Ctrl-C or once the aggregate ends.
async fn next_or_interrupt(
    subscription: &mut AggregateSubscription,
) -> Option<(Category, SnapshotEvent)> {
    tokio::select! {
        event = subscription.next_event() => event,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, closing subscriptions");
            None
        }
    }
}

fn render_map(screen: &MapScreen) {
    let region = screen.region();
    let total = screen.aggregator().points().len();
    println!(
        "Region {:.4},{:.4} span {:.4}x{:.4}: {} nodes for {total} records",
        region.latitude,
        region.longitude,
        region.latitude_delta,
        region.longitude_delta,
        screen.nodes().len(),
    );

    for (index, node) in screen.nodes().iter().enumerate() {
        match node {
            ClusterNode::Cluster { points, .. } => println!(
                "  [{index}] cluster of {} at {:.6},{:.6}",
                points.len(),
                node.latitude(),
                node.longitude()
            ),
            ClusterNode::Marker(point) => {
                println!(
                    "  [{index}] {} ({}) at {:.6},{:.6}",
                    point.title,
                    point.category.title(),
                    point.latitude,
                    point.longitude
                );
                if let Some(description) = &point.description {
                    println!("        {description}");
                }
                println!("        {}", navigation_url(point));
            }
        }
    }
    println!();
}

/// Drills into the first cluster up to `times` times.
fn drill(screen: &mut MapScreen, times: usize) {
    for _ in 0..times {
        let Some(index) = screen.nodes().iter().position(ClusterNode::is_cluster) else {
            log::debug!("No clusters left to drill into");
            break;
        };
        screen.select_cluster(index);
    }
}

/// Streams the clustered map. Subscription failures are logged as
/// warnings and never end the stream.
pub async fn map(
    multi: &MultiProgress,
    store: &dyn RealtimeStore,
    drill_times: usize,
    once: bool,
) {
    let mut subscription = AggregateSubscription::open(store);
    let mut screen = MapScreen::default();
    let mut progress = CategoryProgress::new(multi, "Loading records", Category::all());

    while let Some((category, event)) = next_or_interrupt(&mut subscription).await {
        progress.report(category);
        let was_loading = screen.state() == MapState::Loading;
        if let Some(warning) = screen.apply(category, &event) {
            log::warn!("{warning}");
        }

        if screen.state() == MapState::Loading {
            continue;
        }
        if was_loading {
            progress.finish_and_clear();
            drill(&mut screen, drill_times);
        }

        render_map(&screen);
        if once {
            break;
        }
    }

    progress.finish_and_clear();
    subscription.cancel();
}

pub fn render_entry(entry: &RecordEntry) {
    println!("  {} #{}", entry.title, entry.short_id());
    if let Some(subtitle) = &entry.subtitle {
        println!("    {subtitle}");
    }
    if let Some(location) = &entry.location {
        match &entry.accuracy {
            Some(accuracy) => println!("    Location: {location} (±{accuracy})"),
            None => println!("    Location: {location}"),
        }
    }
    for row in &entry.details {
        println!("    {}: {}", row.label, row.value);
    }
    if let Some(url) = &entry.photo_url {
        println!("    Photo: {url}");
    }
}

fn render_lists(lists: &RecordLists, categories: &[Category]) {
    for category in categories {
        let entries = lists.entries(*category);
        println!("{} ({})", category.title(), entries.len());
        if entries.is_empty() {
            println!("  No records found");
        }
        for entry in entries {
            render_entry(entry);
        }
        println!();
    }
}

/// Streams the record lists, optionally for one category.
pub async fn records(
    multi: &MultiProgress,
    store: &dyn RealtimeStore,
    only: Option<Category>,
    once: bool,
) {
    let categories: Vec<Category> = only.map_or_else(|| Category::all().to_vec(), |c| vec![c]);
    let mut subscription = AggregateSubscription::open_categories(store, &categories);
    let mut lists = RecordLists::new();
    let mut pending: Vec<Category> = categories.clone();
    let mut progress = CategoryProgress::new(multi, "Loading records", &categories);

    while let Some((category, event)) = next_or_interrupt(&mut subscription).await {
        progress.report(category);
        pending.retain(|c| *c != category);
        match &event {
            SnapshotEvent::Snapshot(snapshot) => lists.apply_snapshot(category, snapshot),
            SnapshotEvent::Error(error) => log::warn!("{}", lists.apply_error(category, error)),
        }

        if !pending.is_empty() {
            continue;
        }
        progress.finish_and_clear();
        render_lists(&lists, &categories);
        if once {
            break;
        }
    }

    progress.finish_and_clear();
    subscription.cancel();
}

pub fn render_summary(summary: &Summary) {
    println!("Observations:     {}", summary.observations);
    println!("Unsynced:         {}", summary.unsynced);
    println!("Pollution:        {}", summary.pollution);
    println!("Disturbance:      {}", summary.disturbance);
    println!("Other sightings:  {}", summary.sightings);
    println!();
}

/// Streams the home-screen counts. A failing category keeps its last
/// count.
pub async fn summary(multi: &MultiProgress, store: &dyn RealtimeStore) {
    let categories = Summary::categories();
    let mut subscription = AggregateSubscription::open_categories(store, categories);
    let mut summary = Summary::default();
    let mut pending: Vec<Category> = categories.to_vec();
    let mut progress = CategoryProgress::new(multi, "Loading counts", categories);

    while let Some((category, event)) = next_or_interrupt(&mut subscription).await {
        progress.report(category);
        pending.retain(|c| *c != category);
        if let Some(warning) = summary.apply_event(category, &event) {
            log::warn!("{warning}");
        }

        if pending.is_empty() {
            progress.finish_and_clear();
            render_summary(&summary);
        }
    }

    progress.finish_and_clear();
    subscription.cancel();
}

//! Greedy single-pass proximity clustering.
//!
//! Each point joins the first cluster-in-progress whose anchor (the first
//! point that cluster absorbed) lies within the viewport threshold on both
//! axes, otherwise it starts a new one. The anchor is never moved towards
//! a centroid, so the output depends only on the input order and the
//! viewport.
//!
//! The scan is O(n * k) for k clusters-in-progress, which is fine for the
//! low hundreds of field records but does not scale much further.

use mangrove_map_models::{ClusterNode, Region};
use mangrove_record_models::MapPoint;

struct Group<'a> {
    anchor: &'a MapPoint,
    members: Vec<&'a MapPoint>,
}

impl Group<'_> {
    fn accepts(&self, point: &MapPoint, threshold_lat: f64, threshold_lon: f64) -> bool {
        (point.latitude - self.anchor.latitude).abs() < threshold_lat
            && (point.longitude - self.anchor.longitude).abs() < threshold_lon
    }
}

/// Partitions `points` into markers and clusters for `region`.
///
/// Every input point appears in exactly one output node.
#[must_use]
pub fn cluster_points(points: &[MapPoint], region: &Region) -> Vec<ClusterNode> {
    let (threshold_lat, threshold_lon) = region.thresholds();
    let mut groups: Vec<Group<'_>> = Vec::new();

    for point in points {
        if let Some(group) = groups
            .iter_mut()
            .find(|g| g.accepts(point, threshold_lat, threshold_lon))
        {
            group.members.push(point);
        } else {
            groups.push(Group {
                anchor: point,
                members: vec![point],
            });
        }
    }

    groups
        .into_iter()
        .map(|group| {
            if group.members.len() == 1 {
                ClusterNode::Marker(group.anchor.clone())
            } else {
                ClusterNode::Cluster {
                    latitude: group.anchor.latitude,
                    longitude: group.anchor.longitude,
                    points: group.members.into_iter().cloned().collect(),
                }
            }
        })
        .collect()
}

// SPDX-License-Identifier: GPL-3.0-only

//! PipeWire camera enumeration
//!
//! Cameras are discovered by parsing `pw-cli ls Node`. Rotation and mounting
//! location are not part of that listing, so each video source is queried
//! again with `pw-cli info <id>`.

use super::super::types::{CameraDevice, CameraLocation, SensorRotation};
use tracing::{debug, info, warn};

/// Check if PipeWire capture is possible (GStreamer + pipewiresrc element)
pub fn is_pipewire_available() -> bool {
    if let Err(e) = gstreamer::init() {
        warn!(error = %e, "GStreamer init failed");
        return false;
    }
    gstreamer::ElementFactory::find("pipewiresrc").is_some()
}

/// Enumerate cameras using PipeWire
/// Returns list of available cameras discovered through PipeWire
pub fn enumerate_pipewire_cameras() -> Option<Vec<CameraDevice>> {
    debug!("Attempting to enumerate cameras via PipeWire");

    if !is_pipewire_available() {
        debug!("pipewiresrc not available");
        return None;
    }

    let output = std::process::Command::new("pw-cli")
        .args(["ls", "Node"])
        .output()
        .ok()
        .filter(|o| o.status.success());

    let cameras: Vec<CameraDevice> = match output {
        Some(output) => parse_node_listing(&String::from_utf8_lossy(&output.stdout))
            .into_iter()
            .map(|node| {
                let details = query_node_details(&node.id);
                node.into_device(details)
            })
            .collect(),
        None => {
            debug!("pw-cli command failed");
            Vec::new()
        }
    };

    if !cameras.is_empty() {
        debug!(count = cameras.len(), "Found PipeWire cameras");
        return Some(cameras);
    }

    // Fallback: Let PipeWire use its default camera
    info!("Using PipeWire auto-selection (default camera)");
    Some(vec![CameraDevice {
        name: "Default Camera (PipeWire)".to_string(),
        path: String::new(), // Empty path = PipeWire auto-selects
        metadata_path: None,
        rotation: SensorRotation::None,
        location: CameraLocation::Unknown,
    }])
}

/// A `Video/Source` node from `pw-cli ls Node`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct VideoNode {
    pub id: String,
    pub serial: Option<String>,
    pub name: String,
}

/// Properties only visible through `pw-cli info`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NodeDetails {
    pub rotation: SensorRotation,
    pub location: CameraLocation,
}

impl VideoNode {
    fn into_device(self, details: NodeDetails) -> CameraDevice {
        // Priority: use object.serial for target-object, fallback to node ID
        let path = match &self.serial {
            Some(serial) => format!("pipewire-serial-{}", serial),
            None => format!("pipewire-{}", self.id),
        };
        debug!(id = %self.id, name = %self.name, path = %path, rotation = %details.rotation, location = %details.location, "Found video camera");
        CameraDevice {
            name: self.name,
            path,
            metadata_path: Some(self.id),
            rotation: details.rotation,
            location: details.location,
        }
    }
}

/// Parse the output of `pw-cli ls Node` into video source nodes
pub(crate) fn parse_node_listing(listing: &str) -> Vec<VideoNode> {
    let mut nodes = Vec::new();
    let mut current: Option<VideoNode> = None;
    let mut is_video_source = false;

    let mut flush = |node: Option<VideoNode>, is_video_source: bool| {
        if let Some(node) = node
            && is_video_source
            && !node.name.is_empty()
        {
            nodes.push(node);
        }
    };

    for line in listing.lines() {
        let trimmed = line.trim();

        // Node header: "id 76, type PipeWire:Interface:Node/3"
        if let Some(rest) = trimmed.strip_prefix("id ")
            && trimmed.contains("type PipeWire:Interface:Node")
        {
            flush(current.take(), is_video_source);
            is_video_source = false;
            let id = rest.split(',').next().unwrap_or_default().trim().to_string();
            current = Some(VideoNode {
                id,
                ..VideoNode::default()
            });
            continue;
        }

        let Some(node) = current.as_mut() else {
            continue;
        };

        if trimmed.contains("media.class") && trimmed.contains("\"Video/Source\"") {
            is_video_source = true;
        } else if trimmed.contains("object.serial") {
            node.serial = extract_quoted_value(trimmed);
        } else if trimmed.contains("node.description")
            && let Some(value) = extract_quoted_value(trimmed)
        {
            node.name = value;
        }
    }
    flush(current.take(), is_video_source);

    nodes
}

/// Parse the output of `pw-cli info <id>` for rotation and mounting location
pub(crate) fn parse_node_details(info: &str) -> NodeDetails {
    let mut details = NodeDetails::default();
    for line in info.lines() {
        let trimmed = line.trim();
        if trimmed.contains("api.libcamera.rotation")
            && let Some(value) = extract_quoted_value(trimmed)
        {
            details.rotation = SensorRotation::from_degrees(&value);
        } else if trimmed.contains("api.libcamera.location")
            && let Some(value) = extract_quoted_value(trimmed)
        {
            details.location = CameraLocation::from_property(&value);
        }
    }
    details
}

fn query_node_details(node_id: &str) -> NodeDetails {
    match std::process::Command::new("pw-cli")
        .args(["info", node_id])
        .output()
    {
        Ok(output) if output.status.success() => {
            parse_node_details(&String::from_utf8_lossy(&output.stdout))
        }
        _ => {
            debug!(node_id, "Failed to query node info");
            NodeDetails::default()
        }
    }
}

/// Extract quoted value from a property line (e.g., 'property = "value"' -> "value")
fn extract_quoted_value(line: &str) -> Option<String> {
    let start = line.find('"')?;
    let end = line[start + 1..].find('"')?;
    Some(line[start + 1..start + 1 + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
	id 31, type PipeWire:Interface:Node/3
 		object.serial = "31"
 		node.description = "Dummy-Driver"
 		media.class = "Audio/Sink"
	id 76, type PipeWire:Interface:Node/3
 		object.serial = "2146"
 		node.description = "Integrated Camera (V4L2)"
 		media.class = "Video/Source"
	id 80, type PipeWire:Interface:Node/3
 		node.description = "imx258 (libcamera)"
 		media.class = "Video/Source"
"#;

    #[test]
    fn test_parse_node_listing_keeps_video_sources() {
        let nodes = parse_node_listing(LISTING);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "76");
        assert_eq!(nodes[0].serial.as_deref(), Some("2146"));
        assert_eq!(nodes[0].name, "Integrated Camera (V4L2)");
        assert_eq!(nodes[1].id, "80");
        assert_eq!(nodes[1].serial, None);
    }

    #[test]
    fn test_parse_node_details() {
        let info = r#"
 		api.libcamera.rotation = "270"
 		api.libcamera.location = "front"
"#;
        let details = parse_node_details(info);
        assert_eq!(details.rotation, SensorRotation::Rotate270);
        assert_eq!(details.location, CameraLocation::Front);
    }

    #[test]
    fn test_device_path_prefers_serial() {
        let nodes = parse_node_listing(LISTING);
        let device = nodes[0].clone().into_device(NodeDetails::default());
        assert_eq!(device.path, "pipewire-serial-2146");
        assert_eq!(device.metadata_path.as_deref(), Some("76"));

        let device = nodes[1].clone().into_device(NodeDetails::default());
        assert_eq!(device.path, "pipewire-80");
    }
}

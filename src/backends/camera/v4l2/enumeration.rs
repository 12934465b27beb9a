// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 device discovery
//!
//! Walks `/dev/video*`, keeps nodes that can capture video and reads their
//! card name through `VIDIOC_QUERYCAP`. Nodes the process may not open are
//! still listed, with an empty label, so the caller can tell "no camera"
//! apart from "no permission yet".

use crate::backends::camera::types::{CameraDevice, CameraError, CameraResult, DeviceInfo};
use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use tracing::{debug, info};

/// VIDIOC_QUERYCAP ioctl number
const VIDIOC_QUERYCAP: libc::c_ulong = 0x80685600;

/// Single-planar video capture
const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x00000001;
/// `device_caps` field is valid
const V4L2_CAP_DEVICE_CAPS: u32 = 0x80000000;

#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

/// Subset of `VIDIOC_QUERYCAP` the scanner uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCapability {
    pub driver: String,
    pub card: String,
    pub can_capture: bool,
}

fn c_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).trim().to_string()
}

fn query_cap(fd: RawFd) -> io::Result<V4l2Capability> {
    let mut cap: V4l2Capability = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP as _, &mut cap as *mut V4l2Capability) };
    if result < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(cap)
    }
}

/// Query capabilities of a video node
pub fn query_capability(device_path: &str) -> io::Result<NodeCapability> {
    let file = File::open(device_path)?;
    let cap = query_cap(file.as_raw_fd())?;

    // Per-node caps when the driver provides them, else the whole-device caps
    let caps = if cap.capabilities & V4L2_CAP_DEVICE_CAPS != 0 && cap.device_caps != 0 {
        cap.device_caps
    } else {
        cap.capabilities
    };

    Ok(NodeCapability {
        driver: c_string(&cap.driver),
        card: c_string(&cap.card),
        can_capture: caps & V4L2_CAP_VIDEO_CAPTURE != 0,
    })
}

/// Numeric index of a `videoN` node name
fn node_index(name: &str) -> Option<u32> {
    name.strip_prefix("video")?.parse().ok()
}

/// `/dev/videoN` paths in numeric order
pub fn list_video_nodes(dev_dir: &Path) -> io::Result<Vec<String>> {
    let mut nodes: Vec<(u32, String)> = std::fs::read_dir(dev_dir)?
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            node_index(&name).map(|index| (index, entry.path().to_string_lossy().to_string()))
        })
        .collect();
    nodes.sort();
    Ok(nodes.into_iter().map(|(_, path)| path).collect())
}

fn build_device_info(path: &str, cap: &NodeCapability) -> DeviceInfo {
    let real_path = std::fs::canonicalize(path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string());

    DeviceInfo {
        card: cap.card.clone(),
        driver: cap.driver.clone(),
        path: path.to_string(),
        real_path,
    }
}

/// Enumerate V4L2 capture devices
pub fn enumerate_devices() -> CameraResult<Vec<CameraDevice>> {
    let nodes = list_video_nodes(Path::new("/dev"))
        .map_err(|e| CameraError::EnumerationFailed(format!("Failed to read /dev: {}", e)))?;

    let mut devices = Vec::new();
    for path in nodes {
        match query_capability(&path) {
            Ok(cap) if cap.can_capture => {
                let mut device = CameraDevice::new(path.clone(), cap.card.clone());
                device.device_info = Some(build_device_info(&path, &cap));
                debug!(path = %path, card = %cap.card, driver = %cap.driver, "Found capture node");
                devices.push(device);
            }
            Ok(_) => {
                debug!(path = %path, "Skipping non-capture node");
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!(path = %path, "No permission to query node, label withheld");
                devices.push(CameraDevice::new(path, ""));
            }
            Err(e) => {
                debug!(path = %path, error = %e, "Skipping unreadable node");
            }
        }
    }

    info!(count = devices.len(), "Enumerated V4L2 capture devices");
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_index() {
        assert_eq!(node_index("video0"), Some(0));
        assert_eq!(node_index("video12"), Some(12));
        assert_eq!(node_index("video-codec"), None);
        assert_eq!(node_index("v4l-subdev0"), None);
    }

    #[test]
    fn test_list_video_nodes_sorts_numerically() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["video10", "video2", "video0", "media0"] {
            std::fs::write(dir.path().join(name), b"").expect("write node");
        }

        let nodes = list_video_nodes(dir.path()).expect("list nodes");
        let names: Vec<_> = nodes
            .iter()
            .map(|p| Path::new(p).file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["video0", "video2", "video10"]);
    }

    #[test]
    fn test_c_string_stops_at_nul() {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(b"uvc\0");
        assert_eq!(c_string(&bytes), "uvc");
    }
}

//! Mesh and heightmap writers.
//!
//! The mesh is written as binary glTF 2.0 (`.glb`): one buffer holding
//! positions, vertex colors and indices, one mesh with a single triangle
//! primitive. The heightmap is a bare array of little-endian `f32`.

use crate::mesh::SceneMesh;
use crate::Result;
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::info;

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const COMPONENT_UNSIGNED_BYTE: u32 = 5121;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const COMPONENT_FLOAT: u32 = 5126;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

/// Writes a [`SceneMesh`] to a file.
pub trait MeshExporter {
    /// File extension this exporter produces, without the dot.
    fn extension(&self) -> &str;

    /// Write `mesh` to `path`.
    fn export(&self, mesh: &SceneMesh, path: &Path) -> Result<()>;
}

/// Binary glTF writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlbExporter;

impl GlbExporter {
    /// Encode `mesh` as a `.glb` byte stream.
    pub fn encode(&self, mesh: &SceneMesh) -> Result<Vec<u8>> {
        let vertex_count = mesh.positions.len();
        let index_count = mesh.faces.len() * 3;

        let mut bin = Vec::with_capacity(vertex_count * 16 + index_count * 4);
        for p in &mesh.positions {
            for v in p {
                bin.extend_from_slice(&v.to_le_bytes());
            }
        }
        let colors_offset = bin.len();
        for c in &mesh.colors {
            bin.extend_from_slice(c);
        }
        let indices_offset = bin.len();
        for face in &mesh.faces {
            for i in face {
                bin.extend_from_slice(&i.to_le_bytes());
            }
        }
        let bin_len = bin.len();

        let (min, max) = mesh.bounds();
        let document = json!({
            "asset": { "version": "2.0", "generator": "fsim-terrain" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "mesh": 0, "name": "terrain" }],
            "meshes": [{
                "name": "terrain",
                "primitives": [{
                    "attributes": { "POSITION": 0, "COLOR_0": 1 },
                    "indices": 2,
                    "mode": MODE_TRIANGLES,
                }],
            }],
            "buffers": [{ "byteLength": bin_len }],
            "bufferViews": [
                {
                    "buffer": 0,
                    "byteOffset": 0,
                    "byteLength": colors_offset,
                    "target": TARGET_ARRAY_BUFFER,
                },
                {
                    "buffer": 0,
                    "byteOffset": colors_offset,
                    "byteLength": indices_offset - colors_offset,
                    "target": TARGET_ARRAY_BUFFER,
                },
                {
                    "buffer": 0,
                    "byteOffset": indices_offset,
                    "byteLength": bin_len - indices_offset,
                    "target": TARGET_ELEMENT_ARRAY_BUFFER,
                },
            ],
            "accessors": [
                {
                    "bufferView": 0,
                    "componentType": COMPONENT_FLOAT,
                    "count": vertex_count,
                    "type": "VEC3",
                    "min": min,
                    "max": max,
                },
                {
                    "bufferView": 1,
                    "componentType": COMPONENT_UNSIGNED_BYTE,
                    "normalized": true,
                    "count": vertex_count,
                    "type": "VEC4",
                },
                {
                    "bufferView": 2,
                    "componentType": COMPONENT_UNSIGNED_INT,
                    "count": index_count,
                    "type": "SCALAR",
                },
            ],
        });

        let mut json_chunk = serde_json::to_vec(&document)?;
        while json_chunk.len() % 4 != 0 {
            json_chunk.push(b' ');
        }
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        out.extend_from_slice(&GLB_VERSION.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        out.extend_from_slice(&json_chunk);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin);
        Ok(out)
    }
}

impl MeshExporter for GlbExporter {
    fn extension(&self) -> &str {
        "glb"
    }

    fn export(&self, mesh: &SceneMesh, path: &Path) -> Result<()> {
        let bytes = self.encode(mesh)?;
        fs::write(path, &bytes)?;
        info!(
            "Exported mesh: {} ({} vertices, {} faces)",
            path.display(),
            mesh.vertex_count(),
            mesh.face_count()
        );
        Ok(())
    }
}

/// Write scene heights as raw little-endian `f32`, row-major, no header.
pub fn write_heightmap(heights: &[f32], path: &Path) -> Result<()> {
    let mut bytes = Vec::with_capacity(heights.len() * 4);
    for h in heights {
        bytes.extend_from_slice(&h.to_le_bytes());
    }
    fs::write(path, bytes)?;
    info!("Exported heightmap: {} ({} values)", path.display(), heights.len());
    Ok(())
}

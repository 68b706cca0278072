//! Triangle mesh data, file loading and simplification

use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;

use glam::Vec3;

/// Indexed triangle mesh with one normal per face
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Check that indices form whole triangles over existing vertices
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::InvalidIndices(format!(
                "{} indices do not form whole triangles",
                self.indices.len()
            )));
        }
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.vertices.len())
        {
            return Err(MeshError::InvalidIndices(format!(
                "index {index} out of range for {} vertices",
                self.vertices.len()
            )));
        }
        Ok(())
    }

    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let first = Vec3::from(*self.vertices.first()?);
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            let v = Vec3::from(*v);
            (min.min(v), max.max(v))
        }))
    }

    /// Reduce the vertex count to about `ratio` of the current count by vertex
    /// clustering on a uniform grid.
    ///
    /// `ratio` must lie in `(0, 1]`; `1` returns an unchanged copy.
    /// Triangles collapsed by the clustering are dropped.
    pub fn simplify(&self, ratio: f32) -> Result<MeshData, MeshError> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(MeshError::InvalidRatio(ratio));
        }
        self.validate()?;
        if ratio == 1.0 || self.vertices.len() <= 3 {
            return Ok(self.clone());
        }
        let Some((min, max)) = self.bounding_box() else {
            return Err(MeshError::EmptyMesh);
        };
        let extent = (max - min).max_element();
        if extent <= 0.0 {
            return Ok(self.clone());
        }

        let target = ((self.vertices.len() as f32 * ratio).ceil() as usize).max(3);

        // Largest grid resolution whose cluster count stays within target
        let (mut low, mut high) = (1u32, 1024u32);
        let mut best = self.cluster(min, extent, 1);
        while low <= high {
            let res = low + (high - low) / 2;
            let candidate = self.cluster(min, extent, res);
            if candidate.vertices.len() <= target {
                best = candidate;
                low = res + 1;
            } else {
                high = res - 1;
            }
        }
        Ok(best)
    }

    fn cluster(&self, min: Vec3, extent: f32, res: u32) -> MeshData {
        let cell = extent / res as f32;
        let max_index = res as i32 - 1;

        let mut cell_of: HashMap<[i32; 3], u32> = HashMap::new();
        let mut sums: Vec<(Vec3, u32)> = Vec::new();
        let mut remap: Vec<u32> = Vec::with_capacity(self.vertices.len());

        for v in &self.vertices {
            let p = Vec3::from(*v);
            let rel = ((p - min) / cell).floor();
            let key = [
                (rel.x as i32).clamp(0, max_index),
                (rel.y as i32).clamp(0, max_index),
                (rel.z as i32).clamp(0, max_index),
            ];
            let index = *cell_of.entry(key).or_insert_with(|| {
                sums.push((Vec3::ZERO, 0));
                (sums.len() - 1) as u32
            });
            let slot = &mut sums[index as usize];
            slot.0 += p;
            slot.1 += 1;
            remap.push(index);
        }

        let clustered: Vec<Vec3> = sums.iter().map(|(sum, n)| *sum / *n as f32).collect();

        // Keep only non-degenerate triangles and the vertices they use
        let mut used: HashMap<u32, u32> = HashMap::new();
        let mut out = MeshData::default();
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [
                remap[tri[0] as usize],
                remap[tri[1] as usize],
                remap[tri[2] as usize],
            ];
            if a == b || b == c || a == c {
                continue;
            }
            for old in [a, b, c] {
                let new = *used.entry(old).or_insert_with(|| {
                    out.vertices.push(clustered[old as usize].to_array());
                    (out.vertices.len() - 1) as u32
                });
                out.indices.push(new);
            }
            let (pa, pb, pc) = (
                clustered[a as usize],
                clustered[b as usize],
                clustered[c as usize],
            );
            let normal = (pb - pa).cross(pc - pa).normalize_or(Vec3::Z);
            out.normals.push(normal.to_array());
        }
        out
    }
}

/// Load a mesh file, picking the loader from the extension
pub fn load_mesh(path: impl AsRef<Path>) -> Result<MeshData, MeshError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "stl" => load_stl(path),
        "obj" => load_obj(path),
        _ => Err(MeshError::UnsupportedFormat(path.display().to_string())),
    }
}

pub fn load_stl(path: impl AsRef<Path>) -> Result<MeshData, MeshError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| MeshError::Io(e.to_string()))?;
    let mut reader = BufReader::new(file);

    let mesh = stl_io::read_stl(&mut reader).map_err(|e| MeshError::Parse(e.to_string()))?;
    let data = index_mesh(&mesh);
    if data.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    tracing::debug!(
        "Loaded STL {:?}: {} vertices, {} triangles",
        path,
        data.vertices.len(),
        data.triangle_count()
    );
    Ok(data)
}

pub fn load_obj(path: impl AsRef<Path>) -> Result<MeshData, MeshError> {
    let path = path.as_ref();
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let (models, _materials) =
        tobj::load_obj(path, &options).map_err(|e| MeshError::Parse(e.to_string()))?;

    let mut data = MeshData::default();
    for model in &models {
        let mesh = &model.mesh;
        let offset = data.vertices.len() as u32;
        data.vertices.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| [p[0], p[1], p[2]]),
        );
        data.indices.extend(mesh.indices.iter().map(|i| i + offset));
    }
    if data.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    data.validate()?;
    data.normals = face_normals(&data.vertices, &data.indices);
    tracing::debug!(
        "Loaded OBJ {:?}: {} models, {} triangles",
        path,
        models.len(),
        data.triangle_count()
    );
    Ok(data)
}

/// Convert triangle soup to indexed mesh
fn index_mesh(mesh: &stl_io::IndexedMesh) -> MeshData {
    let mut data = MeshData::default();
    let mut vertex_map: HashMap<[i32; 3], u32> = HashMap::new();

    // Precision for vertex comparison (multiply by this, then round to int)
    const PRECISION: f32 = 10000.0;

    for face in &mesh.faces {
        data.normals.push([face.normal[0], face.normal[1], face.normal[2]]);

        for &vertex_idx in &face.vertices {
            let vertex = mesh.vertices[vertex_idx];
            let v = [vertex[0], vertex[1], vertex[2]];
            let key = [
                (v[0] * PRECISION).round() as i32,
                (v[1] * PRECISION).round() as i32,
                (v[2] * PRECISION).round() as i32,
            ];
            let index = *vertex_map.entry(key).or_insert_with(|| {
                data.vertices.push(v);
                (data.vertices.len() - 1) as u32
            });
            data.indices.push(index);
        }
    }
    data
}

fn face_normals(vertices: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    indices
        .chunks_exact(3)
        .map(|tri| {
            let a = Vec3::from(vertices[tri[0] as usize]);
            let b = Vec3::from(vertices[tri[1] as usize]);
            let c = Vec3::from(vertices[tri[2] as usize]);
            (b - a).cross(c - a).normalize_or(Vec3::Z).to_array()
        })
        .collect()
}

/// Mesh loading and processing errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Mesh has no triangles")]
    EmptyMesh,
    #[error("Unsupported mesh format: {0}")]
    UnsupportedFormat(String),
    #[error("Simplification ratio must be in (0, 1], got {0}")]
    InvalidRatio(f32),
    #[error("Invalid mesh indices: {0}")]
    InvalidIndices(String),
}

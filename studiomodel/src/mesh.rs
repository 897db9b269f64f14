//! Triangle command streams and indexed mesh reconstruction.
//!
//! A mesh stores its triangles as a sequence of runs. Each run starts with a signed 16-bit
//! count: zero ends the stream, a negative count starts a fan and a positive count a strip.
//! `|count|` commands follow, each a `(vertex, normal, s, t)` quadruple of `i16`.

use crate::cursor::LeCursor;
use crate::{BoneVector, Error, Vertex};
use glam::Vec2;
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunKind {
    Fan,
    Strip,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TriangleCommand {
    pub vertex: i16,
    pub normal: i16,
    /// Texel column; divided by the texture width to get `u`.
    pub s: i16,
    /// Texel row; divided by the texture height to get `v`.
    pub t: i16,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TriangleRun {
    pub kind: RunKind,
    pub commands: Vec<TriangleCommand>,
}

/// Parses a command stream starting at `offset` up to and including its terminating zero.
pub fn read_commands(input: &mut LeCursor<'_>, offset: usize) -> Result<Vec<TriangleRun>, Error> {
    input.seek(offset)?;
    let mut runs = Vec::new();
    loop {
        let count = input.read_i16()?;
        if count == 0 {
            break;
        }
        let kind = if count < 0 {
            RunKind::Fan
        } else {
            RunKind::Strip
        };
        let commands = input.read_vec(usize::from(count.unsigned_abs()), 8, |input| {
            let [vertex, normal, s, t] = input.read_i16_array::<4>()?;
            Ok(TriangleCommand {
                vertex,
                normal,
                s,
                t,
            })
        })?;
        runs.push(TriangleRun { kind, commands });
    }
    Ok(runs)
}

/// Triangles of a run of `len` commands, as run-local command indices.
///
/// Fans pivot on command 0. Strips flip every other triangle so that all triangles keep the
/// winding of the first one.
pub fn triangulate(kind: RunKind, len: usize) -> Vec<[usize; 3]> {
    (2..len)
        .map(|j| match kind {
            RunKind::Fan => [j, 0, j - 1],
            RunKind::Strip if j % 2 == 1 => [j - 1, j - 2, j],
            RunKind::Strip => [j - 2, j - 1, j],
        })
        .collect()
}

/// Hashable identity of a vertex under `==`: `0.0` and `-0.0` share a key.
type VertexKey = [u32; 9];

fn vertex_key(v: &Vertex) -> Option<VertexKey> {
    let floats = [
        v.position.x,
        v.position.y,
        v.position.z,
        v.normal.x,
        v.normal.y,
        v.normal.z,
        v.tex_coord.x,
        v.tex_coord.y,
    ];
    let mut key = [0u32; 9];
    for (slot, f) in key.iter_mut().zip(floats) {
        if f.is_nan() {
            // NaN never compares equal, so such a vertex can never be shared.
            return None;
        }
        *slot = if f == 0.0 { 0 } else { f.to_bits() };
    }
    key[8] = u32::from(v.bone);
    Some(key)
}

/// Append-only vertex list that hands out the existing index for an exactly equal vertex.
#[derive(Clone, Debug, Default)]
pub struct VertexSet {
    vertices: Vec<Vertex>,
    lookup: HashMap<VertexKey, u32>,
}

impl VertexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `vertex`, appending it if no equal vertex is present.
    pub fn insert(&mut self, vertex: Vertex) -> u32 {
        let key = vertex_key(&vertex);
        if let Some(index) = key.and_then(|k| self.lookup.get(&k)) {
            return *index;
        }
        let index = self.vertices.len() as u32;
        self.vertices.push(vertex);
        if let Some(key) = key {
            self.lookup.insert(key, index);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn as_slice(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn into_vec(self) -> Vec<Vertex> {
        self.vertices
    }
}

/// Raw per-submodel buffers that triangle commands index into.
#[derive(Copy, Clone, Debug)]
pub struct SubModelBuffers<'a> {
    pub vertices: &'a [BoneVector],
    pub normals: &'a [BoneVector],
}

impl SubModelBuffers<'_> {
    fn resolve(&self, command: &TriangleCommand, texture_size: Vec2) -> Result<Vertex, Error> {
        let vertex = buffer_entry(self.vertices, command.vertex, "vertex")?;
        let normal = buffer_entry(self.normals, command.normal, "normal")?;
        Ok(Vertex {
            position: vertex.vector,
            normal: normal.vector,
            tex_coord: Vec2::new(f32::from(command.s), f32::from(command.t)) / texture_size,
            bone: vertex.bone,
        })
    }
}

fn buffer_entry<'a>(
    buffer: &'a [BoneVector],
    index: i16,
    what: &str,
) -> Result<&'a BoneVector, Error> {
    usize::try_from(index)
        .ok()
        .and_then(|i| buffer.get(i))
        .ok_or_else(|| {
            Error::format(format!(
                "{what} index {index} out of range (len={})",
                buffer.len()
            ))
        })
}

/// Turns decoded runs into a triangle list, interning every corner into `vertices`.
pub fn build_indices(
    runs: &[TriangleRun],
    buffers: SubModelBuffers<'_>,
    texture_size: Vec2,
    vertices: &mut VertexSet,
) -> Result<Vec<u32>, Error> {
    let mut indices = Vec::new();
    for run in runs {
        for triangle in triangulate(run.kind, run.commands.len()) {
            for corner in triangle {
                let vertex = buffers.resolve(&run.commands[corner], texture_size)?;
                indices.push(vertices.insert(vertex));
            }
        }
    }
    Ok(indices)
}

/// Reads one mesh's command stream and checks it against the declared triangle count.
pub(crate) fn reconstruct_mesh(
    input: &mut LeCursor<'_>,
    offset: usize,
    triangle_count: usize,
    buffers: SubModelBuffers<'_>,
    texture_size: Vec2,
    vertices: &mut VertexSet,
) -> Result<Vec<u32>, Error> {
    let runs = read_commands(input, offset)?;
    let indices = build_indices(&runs, buffers, texture_size, vertices)?;
    if triangle_count.checked_mul(3) != Some(indices.len()) {
        return Err(Error::format(format!(
            "mesh declares {triangle_count} triangles but its command stream yields {}",
            indices.len() / 3
        )));
    }
    Ok(indices)
}

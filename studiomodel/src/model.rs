use glam::{Quat, Vec2, Vec3};

/// A fully decoded Studio Model.
///
/// Produced by [`Model::from_bytes`]. Every record that the file addresses by offset has been
/// resolved into owned data; nothing here refers back to the source buffer.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Model {
    pub header: Header,
    pub bones: Vec<Bone>,
    pub bone_controllers: Vec<BoneController>,
    pub attachments: Vec<Attachment>,
    pub hit_boxes: Vec<HitBox>,
    pub sequences: Vec<Sequence>,
    pub sequence_groups: Vec<SequenceGroup>,
    /// Square `num_transitions × num_transitions` table of sequence transition nodes.
    pub transitions: Vec<Vec<u8>>,
    pub textures: Vec<Texture>,
    /// `skin_families[family][skin_ref]` is a texture index.
    pub skin_families: Vec<Vec<i16>>,
    pub body_parts: Vec<BodyPart>,
}

impl Model {
    pub fn bone(&self, name: &str) -> Option<(usize, &Bone)> {
        self.bones.iter().enumerate().find(|(_, b)| b.name == name)
    }

    pub fn sequence(&self, label: &str) -> Option<(usize, &Sequence)> {
        self.sequences
            .iter()
            .enumerate()
            .find(|(_, s)| s.label == label)
    }

    pub fn texture(&self, name: &str) -> Option<(usize, &Texture)> {
        self.textures
            .iter()
            .enumerate()
            .find(|(_, t)| t.name == name)
    }

    /// Indices of bones without a parent, in file order.
    pub fn root_bones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent.is_none())
            .map(|(i, _)| i)
    }

    /// Indices of the direct children of `bone`, in file order.
    pub fn bone_children(&self, bone: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.parent == Some(bone))
            .map(|(i, _)| i)
    }

    /// The texture a mesh is drawn with under skin family 0.
    pub fn mesh_texture(&self, mesh: &Mesh) -> Option<&Texture> {
        self.textures.get(mesh.texture)
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Header {
    pub id: u32,
    pub version: u32,
    pub name: String,
    /// Declared file length; always equal to the decoded buffer length.
    pub length: u32,
    pub eye_position: Vec3,
    /// Ideal movement hull.
    pub min: Vec3,
    pub max: Vec3,
    /// Clipping bounding box.
    pub bbmin: Vec3,
    pub bbmax: Vec3,
    pub flags: u32,
    pub num_bones: usize,
    pub num_bone_controllers: usize,
    pub num_hit_boxes: usize,
    pub num_sequences: usize,
    pub num_sequence_groups: usize,
    pub num_textures: usize,
    pub num_skin_refs: usize,
    pub num_skin_families: usize,
    pub num_body_parts: usize,
    pub num_attachments: usize,
    pub num_transitions: usize,
}

/// Channel slots in [`Bone::value`] and [`Bone::scale`]: position x/y/z, then rotation x/y/z.
pub const BONE_CHANNELS: usize = 6;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bone {
    pub name: String,
    /// Always an index lower than this bone's own index.
    pub parent: Option<usize>,
    pub flags: u32,
    /// Bone controller bound to each channel, if any.
    pub controllers: [Option<usize>; BONE_CHANNELS],
    pub value: [f32; BONE_CHANNELS],
    pub scale: [f32; BONE_CHANNELS],
}

impl Bone {
    /// Rest position.
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.value[0], self.value[1], self.value[2])
    }

    /// Rest rotation as Euler angles in radians.
    pub fn rotation(&self) -> Vec3 {
        Vec3::new(self.value[3], self.value[4], self.value[5])
    }
}

/// A runtime-adjustable channel. Decoded for completeness; the decoder never applies it.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BoneController {
    pub bone: usize,
    /// Channel bitmask (`X`, `Y`, `Z`, `XR`, `YR`, `ZR`, ...).
    pub kind: u32,
    pub start: f32,
    pub end: f32,
    pub rest: i32,
    pub index: i32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Attachment {
    pub name: String,
    pub kind: u32,
    pub bone: usize,
    pub origin: Vec3,
    pub vectors: [Vec3; 3],
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HitBox {
    pub bone: usize,
    pub group: i32,
    pub bbmin: Vec3,
    pub bbmax: Vec3,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sequence {
    pub label: String,
    pub fps: f32,
    pub flags: u32,
    pub activity: i32,
    pub activity_weight: i32,
    /// Bitmask of `MOTION_*` flags.
    pub motion_type: u32,
    pub motion_bone: i32,
    pub linear_movement: Vec3,
    pub bbmin: Vec3,
    pub bbmax: Vec3,
    /// Number of blend channels stored in the file. Only the first one is decoded.
    pub blend_count: usize,
    pub blend_type: [u32; 2],
    pub blend_start: [f32; 2],
    pub blend_end: [f32; 2],
    pub blend_parent: i32,
    pub entry_node: i32,
    pub exit_node: i32,
    pub node_flags: i32,
    pub next_sequence: i32,
    pub events: Vec<Event>,
    pub pivots: Vec<Pivot>,
    /// One entry per frame; each frame holds one sample per bone.
    pub frames: Vec<AnimationFrame>,
}

impl Sequence {
    pub const MOTION_X: u32 = 0x0001;
    pub const MOTION_Y: u32 = 0x0002;
    pub const MOTION_Z: u32 = 0x0004;

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Playback length in seconds, or zero for sequences without a usable frame rate.
    pub fn duration(&self) -> f32 {
        if self.fps > 0.0 {
            self.frames.len() as f32 / self.fps
        } else {
            0.0
        }
    }

    /// Sample time of `frame` in seconds.
    pub fn frame_time(&self, frame: usize) -> f32 {
        if self.fps > 0.0 {
            frame as f32 / self.fps
        } else {
            0.0
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Event {
    pub frame: i32,
    pub event: i32,
    pub kind: i32,
    pub options: String,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Pivot {
    pub origin: Vec3,
    pub start: i32,
    pub end: i32,
}

/// Local bone transforms for one frame, indexed by bone.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AnimationFrame {
    pub positions: Vec<Vec3>,
    pub rotations: Vec<Quat>,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SequenceGroup {
    pub label: String,
    /// File name of an external group. Group 0 is embedded and its name is informational.
    pub name: String,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BodyPart {
    pub name: String,
    pub base: i32,
    pub models: Vec<SubModel>,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SubModel {
    pub name: String,
    pub kind: i32,
    pub bounding_radius: f32,
    /// Raw vertex positions as stored in the file, each bound to one bone.
    pub vertex_buffer: Vec<BoneVector>,
    /// Raw normals as stored in the file, each bound to one bone.
    pub normal_buffer: Vec<BoneVector>,
    pub meshes: Vec<Mesh>,
    /// Deduplicated render vertices shared by every mesh of this submodel.
    pub vertices: Vec<Vertex>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BoneVector {
    pub bone: u8,
    pub vector: Vec3,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Mesh {
    pub triangle_count: usize,
    pub skin_ref: usize,
    pub normal_count: i32,
    /// Texture index selected by skin family 0.
    pub texture: usize,
    /// Triangle list into [`SubModel::vertices`]; always `3 * triangle_count` long.
    pub indices: Vec<u32>,
}

/// One render vertex: a single rigid bone binding, no blend weights.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub bone: u8,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Texture {
    pub name: String,
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    /// `width * height` RGBA8 pixels, row-major.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub rgba: Vec<u8>,
}

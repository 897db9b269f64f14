//! Synthetic model files for tests.
//!
//! [`ModelBuilder`] lays out a version 10 file section by section: data blobs first, then the
//! records that point at them, then the header is patched with every count and offset.

#![allow(dead_code)]

use crate::version::{HEADER_SIZE, PALETTE_ENTRIES, STUDIO_MAGIC, STUDIO_VERSION};
use byteorder::{LittleEndian, WriteBytesExt};

#[derive(Default)]
pub(crate) struct Writer {
    pub buf: Vec<u8>,
}

impl Writer {
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn i16(&mut self, v: i16) {
        self.buf.write_i16::<LittleEndian>(v).expect("vec write");
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.write_u16::<LittleEndian>(v).expect("vec write");
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.write_i32::<LittleEndian>(v).expect("vec write");
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.write_u32::<LittleEndian>(v).expect("vec write");
    }

    pub fn offset(&mut self, v: usize) {
        self.u32(u32::try_from(v).expect("offset fits u32"));
    }

    pub fn f32(&mut self, v: f32) {
        self.buf.write_f32::<LittleEndian>(v).expect("vec write");
    }

    pub fn vec3(&mut self, v: [f32; 3]) {
        for c in v {
            self.f32(c);
        }
    }

    pub fn name(&mut self, s: &str, len: usize) {
        let bytes = s.as_bytes();
        assert!(bytes.len() <= len, "name {s:?} longer than {len}");
        self.buf.extend_from_slice(bytes);
        self.buf.extend(std::iter::repeat_n(0u8, len - bytes.len()));
    }

    pub fn zeros(&mut self, len: usize) {
        self.buf.extend(std::iter::repeat_n(0u8, len));
    }

    pub fn patch_u16(&mut self, at: usize, v: u16) {
        self.buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    pub fn patch_u32(&mut self, at: usize, v: u32) {
        self.buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }
}

/// Encodes a span chain; each entry is `(total, stored deltas)`.
pub(crate) fn spans(entries: &[(u8, &[i16])]) -> Vec<u8> {
    let mut w = Writer::default();
    for (total, values) in entries {
        w.u8(u8::try_from(values.len()).expect("valid fits u8"));
        w.u8(*total);
        for v in *values {
            w.i16(*v);
        }
    }
    w.buf
}

/// Writes per-bone track offset blocks followed by the span chains; returns the block start.
pub(crate) fn write_tracks(w: &mut Writer, tracks: &[[Option<Vec<u8>>; 6]]) -> usize {
    let anim_offset = w.pos();
    w.zeros(tracks.len() * 12);
    for (bone, channels) in tracks.iter().enumerate() {
        let block = anim_offset + bone * 12;
        for (channel, track) in channels.iter().enumerate() {
            if let Some(bytes) = track {
                let relative = u16::try_from(w.pos() - block).expect("track fits u16");
                w.patch_u16(block + channel * 2, relative);
                w.buf.extend_from_slice(bytes);
            }
        }
    }
    anim_offset
}

#[derive(Clone, Debug)]
pub(crate) struct BoneSpec {
    pub name: String,
    pub parent: i32,
    pub controllers: [i32; 6],
    pub value: [f32; 6],
    pub scale: [f32; 6],
}

impl BoneSpec {
    pub fn new(name: &str, parent: i32) -> Self {
        Self {
            name: name.to_string(),
            parent,
            controllers: [-1; 6],
            value: [0.0; 6],
            scale: [1.0; 6],
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SequenceSpec {
    pub label: String,
    pub fps: f32,
    pub frame_count: u32,
    pub motion_type: u32,
    pub motion_bone: i32,
    pub group: u32,
    pub blend_count: u32,
    pub events: Vec<(i32, i32, i32, String)>,
    pub pivots: Vec<([f32; 3], i32, i32)>,
    /// Per bone, per channel: encoded span chain, or `None` for a static channel.
    pub tracks: Vec<[Option<Vec<u8>>; 6]>,
}

impl SequenceSpec {
    pub fn new(label: &str, frame_count: u32, bone_count: usize) -> Self {
        Self {
            label: label.to_string(),
            fps: 30.0,
            frame_count,
            motion_type: 0,
            motion_bone: 0,
            group: 0,
            blend_count: 1,
            events: Vec::new(),
            pivots: Vec::new(),
            tracks: vec![Default::default(); bone_count],
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct TextureSpec {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub indices: Vec<u8>,
    pub palette: Vec<[u8; 3]>,
}

#[derive(Clone, Debug)]
pub(crate) struct MeshSpec {
    pub triangle_count: u32,
    pub skin_ref: u32,
    /// `(run header, commands)`; the terminating zero is appended by the builder.
    pub runs: Vec<(i16, Vec<[i16; 4]>)>,
}

#[derive(Clone, Debug)]
pub(crate) struct SubModelSpec {
    pub name: String,
    pub vertices: Vec<(u8, [f32; 3])>,
    pub normals: Vec<(u8, [f32; 3])>,
    pub meshes: Vec<MeshSpec>,
}

#[derive(Clone, Debug)]
pub(crate) struct BodyPartSpec {
    pub name: String,
    pub base: i32,
    pub models: Vec<SubModelSpec>,
}

#[derive(Clone, Debug)]
pub(crate) struct ModelBuilder {
    pub magic: u32,
    pub version: u32,
    pub name: String,
    pub bones: Vec<BoneSpec>,
    /// `(bone, kind)`
    pub controllers: Vec<(i32, u32)>,
    /// `(name, bone)`
    pub attachments: Vec<(String, i32)>,
    /// `(bone, group)`
    pub hit_boxes: Vec<(i32, i32)>,
    pub sequence_groups: Vec<String>,
    pub sequences: Vec<SequenceSpec>,
    pub transitions: usize,
    pub textures: Vec<TextureSpec>,
    pub skin_families: Vec<Vec<i16>>,
    pub body_parts: Vec<BodyPartSpec>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self {
            magic: STUDIO_MAGIC,
            version: STUDIO_VERSION,
            name: "fixture.mdl".to_string(),
            bones: Vec::new(),
            controllers: Vec::new(),
            attachments: Vec::new(),
            hit_boxes: Vec::new(),
            sequence_groups: vec!["default".to_string()],
            sequences: Vec::new(),
            transitions: 0,
            textures: Vec::new(),
            skin_families: Vec::new(),
            body_parts: Vec::new(),
        }
    }
}

// Header field positions.
const H_LENGTH: usize = 72;
const H_SECTIONS: usize = 140;

impl ModelBuilder {
    pub fn build(&self) -> Vec<u8> {
        let mut w = Writer::default();
        w.u32(self.magic);
        w.u32(self.version);
        w.name(&self.name, 64);
        w.u32(0); // length, patched below
        for v in [[0.0, 0.0, 64.0], [-16.0; 3], [16.0; 3], [-32.0; 3], [32.0; 3]] {
            w.vec3(v);
        }
        w.u32(0); // flags
        assert_eq!(w.pos(), H_SECTIONS);
        w.zeros(HEADER_SIZE - H_SECTIONS);

        let mut sections = [0usize; 26];
        fn set(sections: &mut [usize; 26], slot: usize, count: usize, offset: usize) {
            sections[slot] = count;
            sections[slot + 1] = offset;
        }

        // bones
        let bone_offset = w.pos();
        for bone in &self.bones {
            w.name(&bone.name, 32);
            w.i32(bone.parent);
            w.u32(0);
            for c in bone.controllers {
                w.i32(c);
            }
            for v in bone.value {
                w.f32(v);
            }
            for s in bone.scale {
                w.f32(s);
            }
        }
        set(&mut sections, 0, self.bones.len(), bone_offset);

        let controller_offset = w.pos();
        for &(bone, kind) in &self.controllers {
            w.i32(bone);
            w.u32(kind);
            w.f32(-30.0);
            w.f32(30.0);
            w.i32(0);
            w.i32(0);
        }
        set(&mut sections, 2, self.controllers.len(), controller_offset);

        let hit_box_offset = w.pos();
        for &(bone, group) in &self.hit_boxes {
            w.i32(bone);
            w.i32(group);
            w.vec3([-1.0; 3]);
            w.vec3([1.0; 3]);
        }
        set(&mut sections, 4, self.hit_boxes.len(), hit_box_offset);

        // sequence payloads, then descriptors
        let mut payloads = Vec::new();
        for seq in &self.sequences {
            let event_offset = w.pos();
            for (frame, event, kind, options) in &seq.events {
                w.i32(*frame);
                w.i32(*event);
                w.i32(*kind);
                w.name(options, 64);
            }
            let pivot_offset = w.pos();
            for (origin, start, end) in &seq.pivots {
                w.vec3(*origin);
                w.i32(*start);
                w.i32(*end);
            }
            let anim_offset = write_tracks(&mut w, &seq.tracks);
            payloads.push((event_offset, pivot_offset, anim_offset));
        }
        let sequence_offset = w.pos();
        for (seq, (event_offset, pivot_offset, anim_offset)) in self.sequences.iter().zip(payloads)
        {
            w.name(&seq.label, 32);
            w.f32(seq.fps);
            w.u32(0); // flags
            w.i32(1); // activity
            w.i32(1); // weight
            w.offset(seq.events.len());
            w.offset(event_offset);
            w.u32(seq.frame_count);
            w.offset(seq.pivots.len());
            w.offset(pivot_offset);
            w.u32(seq.motion_type);
            w.i32(seq.motion_bone);
            w.vec3([0.0; 3]);
            w.u32(0);
            w.u32(0);
            w.vec3([-8.0; 3]);
            w.vec3([8.0; 3]);
            w.u32(seq.blend_count);
            w.offset(anim_offset);
            w.u32(0);
            w.u32(0);
            w.f32(0.0);
            w.f32(0.0);
            w.f32(1.0);
            w.f32(1.0);
            w.i32(0); // blend parent
            w.u32(seq.group);
            w.i32(0);
            w.i32(0);
            w.i32(0);
            w.i32(0);
        }
        set(&mut sections, 6, self.sequences.len(), sequence_offset);

        let group_offset = w.pos();
        for label in &self.sequence_groups {
            w.name(label, 32);
            w.name("", 64);
            w.u32(0);
            w.u32(0); // data: animation offsets are absolute
        }
        set(&mut sections, 8, self.sequence_groups.len(), group_offset);

        // textures
        let mut pixel_offsets = Vec::new();
        for tex in &self.textures {
            pixel_offsets.push(w.pos());
            w.buf.extend_from_slice(&tex.indices);
            for i in 0..PALETTE_ENTRIES {
                let rgb = tex.palette.get(i).copied().unwrap_or([0, 0, 0]);
                w.buf.extend_from_slice(&rgb);
            }
        }
        let texture_offset = w.pos();
        for (tex, offset) in self.textures.iter().zip(&pixel_offsets) {
            w.name(&tex.name, 64);
            w.u32(0);
            w.u32(tex.width);
            w.u32(tex.height);
            w.offset(*offset);
        }
        set(&mut sections, 10, self.textures.len(), texture_offset);
        sections[12] = pixel_offsets.first().copied().unwrap_or(0);

        let skin_offset = w.pos();
        for family in &self.skin_families {
            for &t in family {
                w.i16(t);
            }
        }
        sections[13] = self.skin_families.first().map_or(0, Vec::len);
        sections[14] = self.skin_families.len();
        sections[15] = skin_offset;

        // body parts
        let mut part_models = Vec::new();
        for part in &self.body_parts {
            let mut model_records = Vec::new();
            for model in &part.models {
                let vertex_bones = w.pos();
                for (bone, _) in &model.vertices {
                    w.u8(*bone);
                }
                let vertex_offset = w.pos();
                for (_, v) in &model.vertices {
                    w.vec3(*v);
                }
                let normal_bones = w.pos();
                for (bone, _) in &model.normals {
                    w.u8(*bone);
                }
                let normal_offset = w.pos();
                for (_, n) in &model.normals {
                    w.vec3(*n);
                }
                let mut command_offsets = Vec::new();
                for mesh in &model.meshes {
                    command_offsets.push(w.pos());
                    for (header, commands) in &mesh.runs {
                        w.i16(*header);
                        for command in commands {
                            for v in command {
                                w.i16(*v);
                            }
                        }
                    }
                    w.i16(0);
                }
                let mesh_offset = w.pos();
                for (mesh, commands) in model.meshes.iter().zip(command_offsets) {
                    w.u32(mesh.triangle_count);
                    w.offset(commands);
                    w.u32(mesh.skin_ref);
                    w.offset(model.normals.len());
                    w.offset(normal_offset);
                }
                model_records.push((
                    mesh_offset,
                    vertex_bones,
                    vertex_offset,
                    normal_bones,
                    normal_offset,
                ));
            }
            let model_offset = w.pos();
            for (model, (mesh_offset, vb, vo, nb, no)) in part.models.iter().zip(model_records) {
                w.name(&model.name, 64);
                w.i32(0);
                w.f32(16.0);
                w.offset(model.meshes.len());
                w.offset(mesh_offset);
                w.offset(model.vertices.len());
                w.offset(vb);
                w.offset(vo);
                w.offset(model.normals.len());
                w.offset(nb);
                w.offset(no);
                w.u32(0);
                w.u32(0);
            }
            part_models.push(model_offset);
        }
        let body_part_offset = w.pos();
        for (part, model_offset) in self.body_parts.iter().zip(part_models) {
            w.name(&part.name, 64);
            w.offset(part.models.len());
            w.i32(part.base);
            w.offset(model_offset);
        }
        set(&mut sections, 16, self.body_parts.len(), body_part_offset);

        let attachment_offset = w.pos();
        for (name, bone) in &self.attachments {
            w.name(name, 32);
            w.u32(0);
            w.i32(*bone);
            w.vec3([0.0, 0.0, 8.0]);
            w.vec3([1.0, 0.0, 0.0]);
            w.vec3([0.0, 1.0, 0.0]);
            w.vec3([0.0, 0.0, 1.0]);
        }
        set(&mut sections, 18, self.attachments.len(), attachment_offset);

        // sound fields 20..24 stay zero
        let transition_offset = w.pos();
        for i in 0..self.transitions * self.transitions {
            w.u8(u8::try_from(i % 256).expect("fits u8"));
        }
        set(&mut sections, 24, self.transitions, transition_offset);

        for (i, value) in sections.iter().enumerate() {
            w.patch_u32(H_SECTIONS + 4 * i, u32::try_from(*value).expect("fits u32"));
        }
        let length = u32::try_from(w.pos()).expect("length fits u32");
        w.patch_u32(H_LENGTH, length);
        w.buf
    }
}

/// Identity-ish palette: entry `i` is `(i, 2i, 3i)` truncated to bytes.
pub(crate) fn ramp_palette() -> Vec<[u8; 3]> {
    (0..PALETTE_ENTRIES)
        .map(|i| {
            let i = i as u8;
            [i, i.wrapping_mul(2), i.wrapping_mul(3)]
        })
        .collect()
}

/// Two bones, one animated sequence, two textures and one body part with a strip and a fan.
pub(crate) fn fixture() -> ModelBuilder {
    let mut root = BoneSpec::new("root", -1);
    root.value = [1.0, 2.0, 3.0, 0.0, 0.0, 0.0];
    root.scale = [0.5, 0.5, 0.5, 0.01, 0.01, 0.01];
    root.controllers[5] = 0;
    let mut child = BoneSpec::new("child", 0);
    child.value = [0.0, 0.0, 10.0, 0.0, 0.0, 0.5];
    child.scale = [1.0, 1.0, 1.0, 0.1, 0.1, 0.1];

    let mut idle = SequenceSpec::new("idle", 4, 2);
    idle.events.push((2, 5004, 0, "common/null.wav".to_string()));
    idle.pivots.push(([0.0, 0.0, 1.0], 0, 3));
    // root x: 2 stored, 4 total -> 10, 20, 20, 20
    idle.tracks[0][0] = Some(spans(&[(4, &[10, 20])]));
    // root z rotation: two spans -> 1, 2, 3, 3
    idle.tracks[0][5] = Some(spans(&[(2, &[1, 2]), (2, &[3])]));
    // child y: constant 7
    idle.tracks[1][1] = Some(spans(&[(4, &[7])]));

    let mut walk = SequenceSpec::new("walk", 2, 2);
    walk.fps = 15.0;
    walk.motion_type = 0x1 | 0x4;
    walk.motion_bone = 0;
    walk.tracks[0][0] = Some(spans(&[(2, &[4, 8])]));

    let skin = TextureSpec {
        name: "skin.bmp".to_string(),
        width: 4,
        height: 2,
        indices: vec![0, 1, 2, 3, 4, 5, 6, 7],
        palette: ramp_palette(),
    };
    let face = TextureSpec {
        name: "face.bmp".to_string(),
        width: 2,
        height: 2,
        indices: vec![255, 255, 0, 0],
        palette: ramp_palette(),
    };

    let body = SubModelSpec {
        name: "body".to_string(),
        vertices: vec![
            (0, [0.0, 0.0, 0.0]),
            (0, [1.0, 0.0, 0.0]),
            (1, [1.0, 1.0, 0.0]),
            (1, [0.0, 1.0, 0.0]),
        ],
        normals: vec![(0, [0.0, 0.0, 1.0])],
        meshes: vec![
            MeshSpec {
                triangle_count: 2,
                skin_ref: 0,
                runs: vec![(
                    4,
                    vec![[0, 0, 0, 0], [1, 0, 4, 0], [3, 0, 0, 2], [2, 0, 4, 2]],
                )],
            },
            MeshSpec {
                triangle_count: 2,
                skin_ref: 1,
                runs: vec![(
                    -4,
                    vec![[0, 0, 0, 0], [1, 0, 2, 0], [2, 0, 2, 2], [3, 0, 0, 2]],
                )],
            },
        ],
    };

    ModelBuilder {
        bones: vec![root, child],
        controllers: vec![(0, 0x20)],
        attachments: vec![("muzzle".to_string(), 1)],
        hit_boxes: vec![(0, 1), (1, 2)],
        sequences: vec![idle, walk],
        transitions: 2,
        textures: vec![skin, face],
        skin_families: vec![vec![0, 1], vec![1, 0]],
        body_parts: vec![BodyPartSpec {
            name: "studio".to_string(),
            base: 1,
            models: vec![body],
        }],
        ..ModelBuilder::default()
    }
}

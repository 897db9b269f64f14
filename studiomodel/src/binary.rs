//! Studio Model (`.mdl`, version 10) binary loader.
//!
//! The loader is IO-free: it operates on an in-memory byte slice. Every section is addressed
//! by an absolute offset from the file header; offsets are resolved into owned records here and
//! never leak into the returned [`Model`].

use crate::animation::{CurveDecoder, CurveStrategy, strip_root_motion};
use crate::cursor::LeCursor;
use crate::mesh::{SubModelBuffers, VertexSet, reconstruct_mesh};
use crate::texture::read_texture_pixels;
use crate::version::{STUDIO_MAGIC, STUDIO_VERSION};
use crate::{
    Attachment, BONE_CHANNELS, BodyPart, Bone, BoneController, BoneVector, Error, Event, Header,
    HitBox, Mesh, Model, Pivot, Sequence, SequenceGroup, SubModel, Texture, UnsupportedFeature,
};
use glam::Vec2;

const NAME_SHORT: usize = 32;
const NAME_LONG: usize = 64;

// On-file record sizes, the lower bound for pre-allocation.
const BONE_SIZE: usize = 112;
const BONE_CONTROLLER_SIZE: usize = 24;
const ATTACHMENT_SIZE: usize = 88;
const HIT_BOX_SIZE: usize = 32;
const SEQUENCE_SIZE: usize = 176;
const EVENT_SIZE: usize = 76;
const PIVOT_SIZE: usize = 20;
const SEQUENCE_GROUP_SIZE: usize = 104;
const TEXTURE_SIZE: usize = 80;
const BODY_PART_SIZE: usize = 76;
const SUB_MODEL_SIZE: usize = 112;
const MESH_SIZE: usize = 20;

const MOTION_AXES: u32 = Sequence::MOTION_X | Sequence::MOTION_Y | Sequence::MOTION_Z;

/// Runtime knobs for [`Model::from_bytes_with_options`].
#[derive(Clone, Debug, Default)]
pub struct DecodeOptions {
    pub curve_strategy: CurveStrategy,
}

#[derive(Copy, Clone, Debug)]
struct Section {
    count: usize,
    offset: usize,
}

#[derive(Clone, Debug)]
struct RawHeader {
    header: Header,
    bones: Section,
    bone_controllers: Section,
    hit_boxes: Section,
    sequences: Section,
    sequence_groups: Section,
    textures: Section,
    skin_refs: usize,
    skin_families: Section,
    body_parts: Section,
    attachments: Section,
    transitions: Section,
}

#[derive(Clone, Debug)]
struct RawSequence {
    sequence: Sequence,
    events: Section,
    pivots: Section,
    frame_count: usize,
    anim_offset: usize,
    group: u32,
}

#[derive(Clone, Debug)]
struct RawTexture {
    name: String,
    flags: u32,
    width: u32,
    height: u32,
    offset: usize,
}

#[derive(Clone, Debug)]
struct RawSubModel {
    name: String,
    kind: i32,
    bounding_radius: f32,
    meshes: Section,
    vertex_count: usize,
    vertex_bone_offset: usize,
    vertex_offset: usize,
    normal_count: usize,
    normal_bone_offset: usize,
    normal_offset: usize,
}

#[derive(Copy, Clone, Debug)]
struct RawMesh {
    triangle_count: usize,
    command_offset: usize,
    skin_ref: usize,
    normal_count: i32,
}

fn read_len(input: &mut LeCursor<'_>) -> Result<usize, Error> {
    Ok(input.read_u32()? as usize)
}

fn read_section(input: &mut LeCursor<'_>) -> Result<Section, Error> {
    let count = read_len(input)?;
    let offset = read_len(input)?;
    Ok(Section { count, offset })
}

fn read_records<T>(
    input: &mut LeCursor<'_>,
    section: Section,
    record_size: usize,
    mut read: impl FnMut(&mut LeCursor<'_>, usize) -> Result<T, Error>,
) -> Result<Vec<T>, Error> {
    input.seek(section.offset)?;
    let mut index = 0;
    input.read_vec(section.count, record_size, |input| {
        let record = read(input, index)?;
        index += 1;
        Ok(record)
    })
}

fn bone_index(raw: i32, bone_count: usize, context: &str) -> Result<usize, Error> {
    usize::try_from(raw)
        .ok()
        .filter(|&i| i < bone_count)
        .ok_or_else(|| {
            Error::format(format!(
                "{context} references bone {raw} (bones={bone_count})"
            ))
        })
}

fn read_header(input: &mut LeCursor<'_>) -> Result<RawHeader, Error> {
    let id = input.read_u32_at(0)?;
    if id != STUDIO_MAGIC {
        return Err(Error::format(format!(
            "bad magic {id:#010x}, expected {STUDIO_MAGIC:#010x}"
        )));
    }
    let version = input.read_u32()?;
    if version != STUDIO_VERSION {
        return Err(Error::format(format!(
            "unsupported version {version}, expected {STUDIO_VERSION}"
        )));
    }
    let name = input.read_string(NAME_LONG)?;
    let length = input.read_u32()?;
    if length as usize != input.len() {
        return Err(Error::format(format!(
            "header declares {length} bytes but buffer holds {}",
            input.len()
        )));
    }

    let eye_position = input.read_vec3()?;
    let min = input.read_vec3()?;
    let max = input.read_vec3()?;
    let bbmin = input.read_vec3()?;
    let bbmax = input.read_vec3()?;
    let flags = input.read_u32()?;

    let bones = read_section(input)?;
    let bone_controllers = read_section(input)?;
    let hit_boxes = read_section(input)?;
    let sequences = read_section(input)?;
    let sequence_groups = read_section(input)?;
    let textures = read_section(input)?;
    let _texture_data_offset = read_len(input)?;
    let skin_refs = read_len(input)?;
    let skin_families = read_section(input)?;
    let body_parts = read_section(input)?;
    let attachments = read_section(input)?;
    // sound table, sound index, sound groups, sound group index: unused by version 10 files
    let _ = input.read_u32_array::<4>()?;
    let transitions = read_section(input)?;

    Ok(RawHeader {
        header: Header {
            id,
            version,
            name,
            length,
            eye_position,
            min,
            max,
            bbmin,
            bbmax,
            flags,
            num_bones: bones.count,
            num_bone_controllers: bone_controllers.count,
            num_hit_boxes: hit_boxes.count,
            num_sequences: sequences.count,
            num_sequence_groups: sequence_groups.count,
            num_textures: textures.count,
            num_skin_refs: skin_refs,
            num_skin_families: skin_families.count,
            num_body_parts: body_parts.count,
            num_attachments: attachments.count,
            num_transitions: transitions.count,
        },
        bones,
        bone_controllers,
        hit_boxes,
        sequences,
        sequence_groups,
        textures,
        skin_refs,
        skin_families,
        body_parts,
        attachments,
        transitions,
    })
}

fn read_bone(
    input: &mut LeCursor<'_>,
    index: usize,
    controller_count: usize,
) -> Result<Bone, Error> {
    let name = input.read_string(NAME_SHORT)?;
    let parent_raw = input.read_i32()?;
    let parent = match parent_raw {
        -1 => None,
        p => Some(
            usize::try_from(p)
                .ok()
                .filter(|&p| p < index)
                .ok_or_else(|| {
                    Error::format(format!(
                        "bone {index} ('{name}') has parent {p}, which is not an earlier bone"
                    ))
                })?,
        ),
    };
    let flags = input.read_u32()?;

    let raw_controllers = input.read_i32_array::<BONE_CHANNELS>()?;
    let mut controllers = [None; BONE_CHANNELS];
    for (slot, raw) in controllers.iter_mut().zip(raw_controllers) {
        if raw < 0 {
            continue;
        }
        let c = raw as usize;
        if c >= controller_count {
            return Err(Error::format(format!(
                "bone {index} ('{name}') binds controller {raw} (controllers={controller_count})"
            )));
        }
        *slot = Some(c);
    }

    let value = input.read_f32_array::<BONE_CHANNELS>()?;
    let scale = input.read_f32_array::<BONE_CHANNELS>()?;
    Ok(Bone {
        name,
        parent,
        flags,
        controllers,
        value,
        scale,
    })
}

fn read_bone_controller(
    input: &mut LeCursor<'_>,
    bone_count: usize,
) -> Result<BoneController, Error> {
    let bone = bone_index(input.read_i32()?, bone_count, "bone controller")?;
    Ok(BoneController {
        bone,
        kind: input.read_u32()?,
        start: input.read_f32()?,
        end: input.read_f32()?,
        rest: input.read_i32()?,
        index: input.read_i32()?,
    })
}

fn read_attachment(input: &mut LeCursor<'_>, bone_count: usize) -> Result<Attachment, Error> {
    let name = input.read_string(NAME_SHORT)?;
    let kind = input.read_u32()?;
    let bone = bone_index(input.read_i32()?, bone_count, "attachment")?;
    Ok(Attachment {
        name,
        kind,
        bone,
        origin: input.read_vec3()?,
        vectors: input.read_vec3_array::<3>()?,
    })
}

fn read_hit_box(input: &mut LeCursor<'_>, bone_count: usize) -> Result<HitBox, Error> {
    let bone = bone_index(input.read_i32()?, bone_count, "hit box")?;
    Ok(HitBox {
        bone,
        group: input.read_i32()?,
        bbmin: input.read_vec3()?,
        bbmax: input.read_vec3()?,
    })
}

fn read_sequence_desc(input: &mut LeCursor<'_>) -> Result<RawSequence, Error> {
    let label = input.read_string(NAME_SHORT)?;
    let fps = input.read_f32()?;
    let flags = input.read_u32()?;
    let activity = input.read_i32()?;
    let activity_weight = input.read_i32()?;
    let events = read_section(input)?;
    let frame_count = read_len(input)?;
    let pivots = read_section(input)?;
    let motion_type = input.read_u32()?;
    let motion_bone = input.read_i32()?;
    let linear_movement = input.read_vec3()?;
    // automove position / angle indices
    let _ = input.read_u32_array::<2>()?;
    let bbmin = input.read_vec3()?;
    let bbmax = input.read_vec3()?;
    let blend_count = read_len(input)?;
    let anim_offset = read_len(input)?;
    let blend_type = input.read_u32_array::<2>()?;
    let blend_start = input.read_f32_array::<2>()?;
    let blend_end = input.read_f32_array::<2>()?;
    let blend_parent = input.read_i32()?;
    let group = input.read_u32()?;
    let entry_node = input.read_i32()?;
    let exit_node = input.read_i32()?;
    let node_flags = input.read_i32()?;
    let next_sequence = input.read_i32()?;

    Ok(RawSequence {
        sequence: Sequence {
            label,
            fps,
            flags,
            activity,
            activity_weight,
            motion_type,
            motion_bone,
            linear_movement,
            bbmin,
            bbmax,
            blend_count,
            blend_type,
            blend_start,
            blend_end,
            blend_parent,
            entry_node,
            exit_node,
            node_flags,
            next_sequence,
            events: Vec::new(),
            pivots: Vec::new(),
            frames: Vec::new(),
        },
        events,
        pivots,
        frame_count,
        anim_offset,
        group,
    })
}

fn read_event(input: &mut LeCursor<'_>) -> Result<Event, Error> {
    Ok(Event {
        frame: input.read_i32()?,
        event: input.read_i32()?,
        kind: input.read_i32()?,
        options: input.read_string(NAME_LONG)?,
    })
}

fn read_pivot(input: &mut LeCursor<'_>) -> Result<Pivot, Error> {
    Ok(Pivot {
        origin: input.read_vec3()?,
        start: input.read_i32()?,
        end: input.read_i32()?,
    })
}

fn read_sequence_group(input: &mut LeCursor<'_>) -> Result<(SequenceGroup, usize), Error> {
    let label = input.read_string(NAME_SHORT)?;
    let name = input.read_string(NAME_LONG)?;
    // runtime cache pointer
    let _ = input.read_u32()?;
    let data = read_len(input)?;
    Ok((SequenceGroup { label, name }, data))
}

fn read_texture_desc(input: &mut LeCursor<'_>) -> Result<RawTexture, Error> {
    Ok(RawTexture {
        name: input.read_string(NAME_LONG)?,
        flags: input.read_u32()?,
        width: input.read_u32()?,
        height: input.read_u32()?,
        offset: read_len(input)?,
    })
}

fn read_sub_model_desc(input: &mut LeCursor<'_>) -> Result<RawSubModel, Error> {
    let name = input.read_string(NAME_LONG)?;
    let kind = input.read_i32()?;
    let bounding_radius = input.read_f32()?;
    let meshes = read_section(input)?;
    let vertex_count = read_len(input)?;
    let vertex_bone_offset = read_len(input)?;
    let vertex_offset = read_len(input)?;
    let normal_count = read_len(input)?;
    let normal_bone_offset = read_len(input)?;
    let normal_offset = read_len(input)?;
    // group count / index
    let _ = input.read_u32_array::<2>()?;
    Ok(RawSubModel {
        name,
        kind,
        bounding_radius,
        meshes,
        vertex_count,
        vertex_bone_offset,
        vertex_offset,
        normal_count,
        normal_bone_offset,
        normal_offset,
    })
}

fn read_mesh_desc(input: &mut LeCursor<'_>) -> Result<RawMesh, Error> {
    let triangle_count = read_len(input)?;
    let command_offset = read_len(input)?;
    let skin_ref = read_len(input)?;
    let normal_count = input.read_i32()?;
    // per-mesh normal index, superseded by the submodel normal buffer
    let _ = input.read_u32()?;
    Ok(RawMesh {
        triangle_count,
        command_offset,
        skin_ref,
        normal_count,
    })
}

/// Reads `count` bone bytes at `bone_offset` and `count` vectors at `vector_offset`.
fn read_bone_vectors(
    input: &mut LeCursor<'_>,
    count: usize,
    bone_offset: usize,
    vector_offset: usize,
) -> Result<Vec<BoneVector>, Error> {
    let bones = input.read_bytes_at(bone_offset, count)?;
    input.seek(vector_offset)?;
    let mut out = Vec::with_capacity(count);
    for &bone in bones {
        out.push(BoneVector {
            bone,
            vector: input.read_vec3()?,
        });
    }
    Ok(out)
}

fn decode_sequences(
    bytes: &[u8],
    input: &mut LeCursor<'_>,
    raw: &RawHeader,
    bones: &[Bone],
    options: &DecodeOptions,
) -> Result<(Vec<Sequence>, Vec<SequenceGroup>), Error> {
    let mut descs = read_records(input, raw.sequences, SEQUENCE_SIZE, |input, _| {
        read_sequence_desc(input)
    })?;
    for desc in &mut descs {
        let seq = &mut desc.sequence;
        seq.events = read_records(input, desc.events, EVENT_SIZE, |input, _| read_event(input))?;
        seq.pivots = read_records(input, desc.pivots, PIVOT_SIZE, |input, _| read_pivot(input))?;
    }

    let groups = read_records(input, raw.sequence_groups, SEQUENCE_GROUP_SIZE, |input, _| {
        read_sequence_group(input)
    })?;

    let mut sequences = Vec::with_capacity(descs.len());
    for desc in descs {
        let RawSequence {
            mut sequence,
            frame_count,
            anim_offset,
            group,
            ..
        } = desc;
        if group != 0 {
            return Err(Error::unsupported(
                UnsupportedFeature::ExternalSequenceGroup { group },
            ));
        }
        let (_, group_data) = groups.first().ok_or_else(|| {
            Error::format(format!(
                "sequence '{}' needs sequence group 0 but the model has none",
                sequence.label
            ))
        })?;
        if sequence.fps <= 0.0 {
            log::warn!(
                "sequence '{}' has non-positive fps {}",
                sequence.label,
                sequence.fps
            );
        }
        if sequence.blend_count > 1 {
            log::warn!(
                "sequence '{}' stores {} blends; decoding blend 0 only",
                sequence.label,
                sequence.blend_count
            );
        }

        let mut frames = CurveDecoder::new(bytes, bones, group_data + anim_offset, 0)?
            .frames(frame_count, options.curve_strategy)?;

        if sequence.motion_type & MOTION_AXES != 0 {
            let motion_bone = bone_index(
                sequence.motion_bone,
                bones.len(),
                &format!("motion of sequence '{}'", sequence.label),
            )?;
            strip_root_motion(&mut frames, sequence.motion_type, motion_bone)?;
        }

        log::trace!(
            "sequence '{}': {} frames at {} fps, {} events",
            sequence.label,
            frames.len(),
            sequence.fps,
            sequence.events.len()
        );
        sequence.frames = frames;
        sequences.push(sequence);
    }

    Ok((sequences, groups.into_iter().map(|(g, _)| g).collect()))
}

fn read_transitions(input: &mut LeCursor<'_>, section: Section) -> Result<Vec<Vec<u8>>, Error> {
    input.seek(section.offset)?;
    input.read_vec(section.count, section.count, |input| {
        Ok(input.read_bytes(section.count)?.to_vec())
    })
}

#[cfg(feature = "parallel")]
fn expand_textures(bytes: &[u8], descs: &[RawTexture]) -> Result<Vec<Vec<u8>>, Error> {
    use rayon::prelude::*;

    descs
        .par_iter()
        .map(|t| read_texture_pixels(&mut LeCursor::new(bytes), t.offset, t.width, t.height))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn expand_textures(bytes: &[u8], descs: &[RawTexture]) -> Result<Vec<Vec<u8>>, Error> {
    let mut input = LeCursor::new(bytes);
    descs
        .iter()
        .map(|t| read_texture_pixels(&mut input, t.offset, t.width, t.height))
        .collect()
}

fn decode_textures(
    bytes: &[u8],
    input: &mut LeCursor<'_>,
    raw: &RawHeader,
) -> Result<(Vec<Texture>, Vec<Vec<i16>>), Error> {
    let descs = read_records(input, raw.textures, TEXTURE_SIZE, |input, _| {
        read_texture_desc(input)
    })?;

    input.seek(raw.skin_families.offset)?;
    let skin_families = if raw.skin_refs == 0 {
        log::debug!(
            "{} skin families without skin references, ignoring them",
            raw.skin_families.count
        );
        Vec::new()
    } else {
        input.read_vec(raw.skin_families.count, raw.skin_refs.saturating_mul(2), |input| {
            input.read_i16_vec(raw.skin_refs)
        })?
    };

    let pixels = expand_textures(bytes, &descs)?;
    let textures = descs
        .into_iter()
        .zip(pixels)
        .map(|(desc, rgba)| Texture {
            name: desc.name,
            flags: desc.flags,
            width: desc.width,
            height: desc.height,
            rgba,
        })
        .collect();
    Ok((textures, skin_families))
}

/// Texture index and size used for a mesh's texture coordinates (skin family 0).
fn mesh_texture(
    textures: &[Texture],
    skin_families: &[Vec<i16>],
    skin_ref: usize,
) -> Result<(usize, Vec2), Error> {
    if textures.is_empty() {
        return Err(Error::unsupported(UnsupportedFeature::ExternalTextures));
    }
    let family = skin_families
        .first()
        .ok_or_else(|| Error::format("model has textures but no skin families"))?;
    let raw = *family.get(skin_ref).ok_or_else(|| {
        Error::format(format!(
            "skin reference {skin_ref} out of range (skin refs={})",
            family.len()
        ))
    })?;
    let index = usize::try_from(raw)
        .ok()
        .filter(|&i| i < textures.len())
        .ok_or_else(|| {
            Error::format(format!(
                "skin family 0 maps skin reference {skin_ref} to texture {raw} (textures={})",
                textures.len()
            ))
        })?;
    let texture = &textures[index];
    Ok((
        index,
        Vec2::new(texture.width as f32, texture.height as f32),
    ))
}

fn decode_sub_model(
    input: &mut LeCursor<'_>,
    desc: RawSubModel,
    textures: &[Texture],
    skin_families: &[Vec<i16>],
) -> Result<SubModel, Error> {
    let raw_meshes = read_records(input, desc.meshes, MESH_SIZE, |input, _| read_mesh_desc(input))?;
    let vertex_buffer = read_bone_vectors(
        input,
        desc.vertex_count,
        desc.vertex_bone_offset,
        desc.vertex_offset,
    )?;
    let normal_buffer = read_bone_vectors(
        input,
        desc.normal_count,
        desc.normal_bone_offset,
        desc.normal_offset,
    )?;

    let buffers = SubModelBuffers {
        vertices: &vertex_buffer,
        normals: &normal_buffer,
    };
    let mut vertices = VertexSet::new();
    let mut meshes = Vec::with_capacity(raw_meshes.len());
    for raw in raw_meshes {
        let (texture, texture_size) = mesh_texture(textures, skin_families, raw.skin_ref)?;
        let indices = reconstruct_mesh(
            input,
            raw.command_offset,
            raw.triangle_count,
            buffers,
            texture_size,
            &mut vertices,
        )
        .map_err(|e| match e {
            Error::Format { message } => {
                Error::format(format!("submodel '{}': {message}", desc.name))
            }
            other => other,
        })?;
        meshes.push(Mesh {
            triangle_count: raw.triangle_count,
            skin_ref: raw.skin_ref,
            normal_count: raw.normal_count,
            texture,
            indices,
        });
    }

    log::trace!(
        "submodel '{}': {} meshes, {} unique vertices from {} positions",
        desc.name,
        meshes.len(),
        vertices.len(),
        vertex_buffer.len()
    );

    Ok(SubModel {
        name: desc.name,
        kind: desc.kind,
        bounding_radius: desc.bounding_radius,
        vertex_buffer,
        normal_buffer,
        meshes,
        vertices: vertices.into_vec(),
    })
}

fn decode_body_parts(
    input: &mut LeCursor<'_>,
    raw: &RawHeader,
    textures: &[Texture],
    skin_families: &[Vec<i16>],
) -> Result<Vec<BodyPart>, Error> {
    let parts = read_records(input, raw.body_parts, BODY_PART_SIZE, |input, _| {
        let name = input.read_string(NAME_LONG)?;
        let models = read_len(input)?;
        let base = input.read_i32()?;
        let offset = read_len(input)?;
        Ok((name, base, Section {
            count: models,
            offset,
        }))
    })?;

    let mut body_parts = Vec::with_capacity(parts.len());
    for (name, base, section) in parts {
        let descs = read_records(input, section, SUB_MODEL_SIZE, |input, _| {
            read_sub_model_desc(input)
        })?;
        let mut models = Vec::with_capacity(descs.len());
        for desc in descs {
            models.push(decode_sub_model(input, desc, textures, skin_families)?);
        }
        body_parts.push(BodyPart { name, base, models });
    }
    Ok(body_parts)
}

impl Model {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Self::from_bytes_with_options(bytes, &DecodeOptions::default())
    }

    pub fn from_bytes_with_options(bytes: &[u8], options: &DecodeOptions) -> Result<Self, Error> {
        let mut input = LeCursor::new(bytes);
        let raw = read_header(&mut input)?;
        log::trace!("studio model '{}': header ok", raw.header.name);

        let controller_count = raw.bone_controllers.count;
        let bones = read_records(&mut input, raw.bones, BONE_SIZE, |input, index| {
            read_bone(input, index, controller_count)
        })?;
        let bone_count = bones.len();
        let bone_controllers = read_records(
            &mut input,
            raw.bone_controllers,
            BONE_CONTROLLER_SIZE,
            |input, _| read_bone_controller(input, bone_count),
        )?;
        let attachments = read_records(&mut input, raw.attachments, ATTACHMENT_SIZE, |input, _| {
            read_attachment(input, bone_count)
        })?;
        let hit_boxes = read_records(&mut input, raw.hit_boxes, HIT_BOX_SIZE, |input, _| {
            read_hit_box(input, bone_count)
        })?;

        let (sequences, sequence_groups) =
            decode_sequences(bytes, &mut input, &raw, &bones, options)?;
        let transitions = read_transitions(&mut input, raw.transitions)?;
        if !transitions.is_empty() {
            log::debug!(
                "studio model '{}' carries a {n}x{n} transition table",
                raw.header.name,
                n = transitions.len()
            );
        }

        let (textures, skin_families) = decode_textures(bytes, &mut input, &raw)?;
        let body_parts = decode_body_parts(&mut input, &raw, &textures, &skin_families)?;

        log::debug!(
            "decoded studio model '{}': {} bones, {} sequences, {} textures, {} body parts",
            raw.header.name,
            bones.len(),
            sequences.len(),
            textures.len(),
            body_parts.len()
        );

        Ok(Model {
            header: raw.header,
            bones,
            bone_controllers,
            attachments,
            hit_boxes,
            sequences,
            sequence_groups,
            transitions,
            textures,
            skin_families,
            body_parts,
        })
    }
}

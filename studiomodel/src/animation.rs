//! Run-length compressed animation curves.
//!
//! Every bone owns a 12-byte block of six `u16` track offsets per sequence blend, in
//! [`Channel`] order. A zero offset means the channel never leaves the bone's rest value. A
//! non-zero offset, relative to the start of the bone's block, points to a chain of spans:
//!
//! ```text
//! valid: u8, total: u8, value[0..valid]: i16
//! ```
//!
//! A span covers `total` frames. The first `valid` frames store their own delta, the remaining
//! frames repeat the last stored one. Final values are `rest + delta * scale`.

use crate::cursor::LeCursor;
use crate::math::{angle_quaternion, quaternion_slerp};
use crate::{AnimationFrame, BONE_CHANNELS, Bone, Error, Sequence, UnsupportedFeature};
use glam::{Quat, Vec3};

/// Size of one bone's track offset block.
pub const BONE_TRACKS_SIZE: usize = BONE_CHANNELS * 2;

/// How span chains are walked while decoding a sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum CurveStrategy {
    /// Walk each chain from its first span for every frame.
    SpanWalk,
    /// Walk each chain once, advancing one frame at a time. Yields the same values as
    /// [`CurveStrategy::SpanWalk`].
    #[default]
    Incremental,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Channel {
    PositionX,
    PositionY,
    PositionZ,
    RotationX,
    RotationY,
    RotationZ,
}

impl Channel {
    pub const ALL: [Channel; BONE_CHANNELS] = [
        Self::PositionX,
        Self::PositionY,
        Self::PositionZ,
        Self::RotationX,
        Self::RotationY,
        Self::RotationZ,
    ];

    /// Slot in the bone's track block and in [`Bone::value`] / [`Bone::scale`].
    pub fn index(self) -> usize {
        match self {
            Self::PositionX => 0,
            Self::PositionY => 1,
            Self::PositionZ => 2,
            Self::RotationX => 3,
            Self::RotationY => 4,
            Self::RotationZ => 5,
        }
    }

    pub fn is_rotation(self) -> bool {
        self.index() >= 3
    }
}

/// Stored deltas that one frame of a channel resolves to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CurveSample {
    Hold(i16),
    /// Blends from the first delta (`s = 0`) toward the second (`s = 1`).
    Blend(i16, i16),
}

#[derive(Copy, Clone, Debug)]
struct Span {
    offset: usize,
    valid: usize,
    total: usize,
}

impl Span {
    fn read(input: &mut LeCursor<'_>, offset: usize) -> Result<Self, Error> {
        let valid = usize::from(input.read_u8_at(offset)?);
        let total = usize::from(input.read_u8()?);
        Ok(Self {
            offset,
            valid,
            total,
        })
    }

    fn next(&self, input: &mut LeCursor<'_>) -> Result<Self, Error> {
        Self::read(input, self.offset + (self.valid + 1) * 2)
    }

    /// Skips whole spans until frame `k` (relative to this span) falls inside one.
    fn locate(mut self, input: &mut LeCursor<'_>, mut k: usize) -> Result<(Self, usize), Error> {
        while self.total <= k {
            k -= self.total;
            self = self.next(input)?;
        }
        Ok((self, k))
    }

    /// The stored delta in the `slot`-th i16 after the span header's position.
    fn delta(&self, input: &mut LeCursor<'_>, slot: usize) -> Result<i16, Error> {
        input.read_i16_at(self.offset + slot * 2)
    }

    /// Resolves frame `k`, which must lie inside this span.
    ///
    /// Slot `k + 1` holds stored delta `k`; slot `valid` holds the last stored delta; slot
    /// `valid + 2` holds the first delta of the following span.
    fn sample(
        &self,
        input: &mut LeCursor<'_>,
        k: usize,
        rotation: bool,
    ) -> Result<CurveSample, Error> {
        let at_span_end = self.total <= k + 1;
        if self.valid > k {
            let v1 = self.delta(input, k + 1)?;
            if self.valid > k + 1 {
                Ok(CurveSample::Blend(v1, self.delta(input, k + 2)?))
            } else if rotation && at_span_end {
                Ok(CurveSample::Blend(v1, self.delta(input, self.valid + 2)?))
            } else {
                Ok(CurveSample::Hold(v1))
            }
        } else {
            let v1 = self.delta(input, self.valid)?;
            if at_span_end {
                Ok(CurveSample::Blend(v1, self.delta(input, self.valid + 2)?))
            } else {
                Ok(CurveSample::Hold(v1))
            }
        }
    }
}

/// Decodes the curves of one sequence blend.
///
/// Owns a private cursor, so several decoders may run over the same buffer at once.
#[derive(Clone, Debug)]
pub struct CurveDecoder<'a, 'b> {
    input: LeCursor<'a>,
    bones: &'b [Bone],
    base: usize,
}

impl<'a, 'b> CurveDecoder<'a, 'b> {
    /// `anim_offset` is the absolute offset of the sequence's animation data. Only blend 0 is
    /// supported.
    pub fn new(
        bytes: &'a [u8],
        bones: &'b [Bone],
        anim_offset: usize,
        blend: u32,
    ) -> Result<Self, Error> {
        if blend != 0 {
            return Err(Error::unsupported(UnsupportedFeature::SecondaryBlend { blend }));
        }
        Ok(Self {
            input: LeCursor::new(bytes),
            bones,
            base: anim_offset,
        })
    }

    fn bone_base(&self, bone: usize) -> usize {
        self.base + bone * BONE_TRACKS_SIZE
    }

    /// Absolute offset of the first span of a channel, or `None` for a static channel.
    pub fn track_offset(&mut self, bone: usize, channel: Channel) -> Result<Option<usize>, Error> {
        let bone_base = self.bone_base(bone);
        let relative = self
            .input
            .read_u16_at(bone_base + channel.index() * 2)?;
        Ok((relative != 0).then(|| bone_base + usize::from(relative)))
    }

    /// Resolves one frame by walking the channel's spans from the start.
    pub fn sample(
        &mut self,
        bone: usize,
        channel: Channel,
        frame: usize,
    ) -> Result<Option<CurveSample>, Error> {
        let Some(offset) = self.track_offset(bone, channel)? else {
            return Ok(None);
        };
        let (span, k) = Span::read(&mut self.input, offset)?.locate(&mut self.input, frame)?;
        span.sample(&mut self.input, k, channel.is_rotation()).map(Some)
    }

    /// Resolves frames `0..frame_count` of one channel.
    pub fn samples(
        &mut self,
        bone: usize,
        channel: Channel,
        frame_count: usize,
        strategy: CurveStrategy,
    ) -> Result<Option<Vec<CurveSample>>, Error> {
        let Some(offset) = self.track_offset(bone, channel)? else {
            return Ok(None);
        };
        let rotation = channel.is_rotation();
        let mut out = Vec::with_capacity(frame_count);
        if frame_count == 0 {
            return Ok(Some(out));
        }
        match strategy {
            CurveStrategy::SpanWalk => {
                for frame in 0..frame_count {
                    let (span, k) =
                        Span::read(&mut self.input, offset)?.locate(&mut self.input, frame)?;
                    out.push(span.sample(&mut self.input, k, rotation)?);
                }
            }
            CurveStrategy::Incremental => {
                let mut span = Span::read(&mut self.input, offset)?;
                let mut k = 0;
                for frame in 0..frame_count {
                    if frame > 0 {
                        k += 1;
                    }
                    (span, k) = span.locate(&mut self.input, k)?;
                    out.push(span.sample(&mut self.input, k, rotation)?);
                }
            }
        }
        Ok(Some(out))
    }

    /// Decodes every frame of the sequence at whole-frame positions (`s = 0`).
    pub fn frames(
        &mut self,
        frame_count: usize,
        strategy: CurveStrategy,
    ) -> Result<Vec<AnimationFrame>, Error> {
        let bones = self.bones;
        let mut frames: Vec<AnimationFrame> = (0..frame_count)
            .map(|_| AnimationFrame {
                positions: Vec::with_capacity(bones.len()),
                rotations: Vec::with_capacity(bones.len()),
            })
            .collect();

        for (index, bone) in bones.iter().enumerate() {
            let mut tracks: [Option<Vec<CurveSample>>; BONE_CHANNELS] = Default::default();
            for channel in Channel::ALL {
                tracks[channel.index()] = self.samples(index, channel, frame_count, strategy)?;
            }
            let at = |channel: usize, frame: usize| {
                tracks[channel].as_ref().map(|samples| samples[frame])
            };
            for (f, frame) in frames.iter_mut().enumerate() {
                frame
                    .positions
                    .push(bone_position(bone, [at(0, f), at(1, f), at(2, f)], 0.0));
                frame
                    .rotations
                    .push(bone_rotation(bone, [at(3, f), at(4, f), at(5, f)], 0.0));
            }
        }
        Ok(frames)
    }
}

/// Local position of `bone` from its three position-channel samples at blend fraction `s`.
pub fn bone_position(bone: &Bone, samples: [Option<CurveSample>; 3], s: f32) -> Vec3 {
    let mut pos = [0.0f32; 3];
    for (j, sample) in samples.into_iter().enumerate() {
        pos[j] = match sample {
            None => bone.value[j],
            Some(CurveSample::Hold(v)) => bone.value[j] + f32::from(v) * bone.scale[j],
            Some(CurveSample::Blend(v1, v2)) => {
                let delta = f32::from(v1) * (1.0 - s) + s * f32::from(v2);
                bone.value[j] + delta * bone.scale[j]
            }
        };
    }
    Vec3::from_array(pos)
}

/// Local rotation of `bone` from its three rotation-channel samples at blend fraction `s`.
pub fn bone_rotation(bone: &Bone, samples: [Option<CurveSample>; 3], s: f32) -> Quat {
    let mut from = [0.0f32; 3];
    let mut to = [0.0f32; 3];
    for (j, sample) in samples.into_iter().enumerate() {
        let base = bone.value[j + 3];
        let scale = bone.scale[j + 3];
        (from[j], to[j]) = match sample {
            None => (base, base),
            Some(CurveSample::Hold(v)) => {
                let angle = base + f32::from(v) * scale;
                (angle, angle)
            }
            Some(CurveSample::Blend(v1, v2)) => (
                base + f32::from(v1) * scale,
                base + f32::from(v2) * scale,
            ),
        };
    }
    let from = Vec3::from_array(from);
    let to = Vec3::from_array(to);
    if from == to {
        angle_quaternion(from)
    } else {
        quaternion_slerp(angle_quaternion(from), angle_quaternion(to), s)
    }
}

/// Zeroes the root-motion axes selected by `motion_type` on `motion_bone` in every frame.
///
/// Fails with [`Error::Format`] before touching any frame if `motion_bone` is missing from one.
pub fn strip_root_motion(
    frames: &mut [AnimationFrame],
    motion_type: u32,
    motion_bone: usize,
) -> Result<(), Error> {
    if let Some(frame) = frames.iter().find(|f| motion_bone >= f.positions.len()) {
        return Err(Error::format(format!(
            "motion bone {motion_bone} out of range ({} bones)",
            frame.positions.len()
        )));
    }
    for frame in frames {
        let pos = &mut frame.positions[motion_bone];
        if motion_type & Sequence::MOTION_X != 0 {
            pos.x = 0.0;
        }
        if motion_type & Sequence::MOTION_Y != 0 {
            pos.y = 0.0;
        }
        if motion_type & Sequence::MOTION_Z != 0 {
            pos.z = 0.0;
        }
    }
    Ok(())
}

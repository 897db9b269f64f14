//! Rotation helpers matching the Studio Model tool chain.
//!
//! Vector value types come from `glam`. Angle conversion and slerp follow the format's tool
//! chain, not glam's `EulerRot`/`Quat::slerp` conventions.

use glam::{Quat, Vec3};

const SLERP_EPSILON: f32 = 1.0e-8;

/// Converts Euler angles in radians (`x` = roll, `y` = pitch, `z` = yaw) to a quaternion.
///
/// Half-angle sines and cosines are composed in roll-pitch-yaw order.
pub fn angle_quaternion(angles: Vec3) -> Quat {
    let (sy, cy) = (angles.z * 0.5).sin_cos();
    let (sp, cp) = (angles.y * 0.5).sin_cos();
    let (sr, cr) = (angles.x * 0.5).sin_cos();

    Quat::from_xyzw(
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
        cr * cp * cy + sr * sp * sy,
    )
}

/// Spherical linear interpolation from `p` (t = 0) to `q` (t = 1) along the shorter arc.
///
/// Nearly identical inputs fall back to linear weights; nearly opposite inputs rotate `p` by a
/// perpendicular quaternion.
pub fn quaternion_slerp(p: Quat, q: Quat, t: f32) -> Quat {
    if p == q {
        return p;
    }

    let p = p.to_array();
    let mut q = q.to_array();

    let mut a = 0.0;
    let mut b = 0.0;
    for i in 0..4 {
        a += (p[i] - q[i]) * (p[i] - q[i]);
        b += (p[i] + q[i]) * (p[i] + q[i]);
    }
    if a > b {
        for v in &mut q {
            *v = -*v;
        }
    }

    let cosom = p[0] * q[0] + p[1] * q[1] + p[2] * q[2] + p[3] * q[3];

    let mut out = [0.0f32; 4];
    if 1.0 + cosom > SLERP_EPSILON {
        let (sclp, sclq) = if 1.0 - cosom > SLERP_EPSILON {
            let omega = cosom.acos();
            let sinom = omega.sin();
            (
                ((1.0 - t) * omega).sin() / sinom,
                (t * omega).sin() / sinom,
            )
        } else {
            (1.0 - t, t)
        };
        for i in 0..4 {
            out[i] = sclp * p[i] + sclq * q[i];
        }
    } else {
        out = [-p[1], p[0], -p[3], p[2]];
        let sclp = ((1.0 - t) * 0.5 * std::f32::consts::PI).sin();
        let sclq = (t * 0.5 * std::f32::consts::PI).sin();
        for i in 0..3 {
            out[i] = sclp * p[i] + sclq * out[i];
        }
    }

    Quat::from_array(out)
}

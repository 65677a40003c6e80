use std::f32::consts::PI;

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use super::{ImportContext, ImportWarning, ReferenceKind};
use crate::assets::{AnimationClip, AnimationTrack, Curve, Interpolation, Keyframe, TrackProperty};
use crate::log_debug;
use crate::scene::Scene;
use crate::source::{QuatKey, SourceAnimation, VectorKey};

const ANGLE_EPSILON: f32 = 1e-5;

/// A clip together with the number of keyframes the simplifier removed.
#[derive(Debug, Clone)]
pub struct CompressedClip {
    pub clip: AnimationClip,
    pub removed_keyframes: usize,
}

// ─── Extraction ───────────────────────────────────────────────────────────────

/// Convert one source animation into a clip of per-property tracks, simplify
/// them when the filter is enabled, and order them by descending target path.
pub fn compress_animation(
    animation: &SourceAnimation,
    scene: &Scene,
    ctx: &mut ImportContext,
) -> CompressedClip {
    let settings = ctx.settings;
    let filter = &settings.animation_filter;
    let conversion = ctx.conversion;
    let ticks_per_second = if animation.ticks_per_second > 0.0 {
        animation.ticks_per_second
    } else {
        1.0
    };

    let mut clip = AnimationClip {
        name: animation.name.clone(),
        tracks: Vec::new(),
    };
    let mut removed_keyframes = 0;

    for channel in &animation.channels {
        let Some(&actor) = ctx.actors_by_name.get(&channel.node_name) else {
            ctx.warn(ImportWarning::UnresolvedReference {
                kind: ReferenceKind::Channel,
                name: channel.node_name.clone(),
            });
            continue;
        };
        let target = ctx
            .target_path(scene, actor)
            .unwrap_or_else(|| channel.node_name.clone());

        if channel.position_keys.len() > 1 {
            let mut track = vector_track(
                &target,
                TrackProperty::Position,
                &channel.position_keys,
                ticks_per_second,
                |value| conversion.point(value),
            );
            if filter.enabled {
                removed_keyframes += simplify_vector_track(&mut track, filter.position_threshold);
            }
            clip.tracks.push(track);
        }

        if channel.rotation_keys.len() > 1 {
            let mut track = quaternion_track(&target, &channel.rotation_keys, ticks_per_second);
            if filter.enabled {
                removed_keyframes +=
                    simplify_quaternion_track(&mut track, filter.rotation_threshold);
            }
            clip.tracks.push(track);
        }

        if channel.scale_keys.len() > 1 {
            let mut track = vector_track(
                &target,
                TrackProperty::Scale,
                &channel.scale_keys,
                ticks_per_second,
                |value| *value,
            );
            if filter.enabled {
                removed_keyframes += simplify_vector_track(&mut track, filter.scale_threshold);
            }
            clip.tracks.push(track);
        }
    }

    clip.sort_tracks();
    log_debug!(
        "clip '{}': {} tracks, {} keyframes removed",
        clip.name,
        clip.tracks.len(),
        removed_keyframes
    );

    CompressedClip {
        clip,
        removed_keyframes,
    }
}

/// Duration in milliseconds and a normalizer for key times, both from source ticks.
fn timeline(last_tick: f64, ticks_per_second: f64) -> (f32, impl Fn(f64) -> f32) {
    let duration_ms = last_tick / ticks_per_second * 1000.0;
    let normalize = move |tick: f64| {
        if duration_ms > 0.0 {
            (tick / ticks_per_second * 1000.0 / duration_ms) as f32
        } else {
            0.0
        }
    };
    (duration_ms as f32, normalize)
}

fn curves_from(rows: impl Iterator<Item = (f32, Vec<f32>)>, components: usize) -> Vec<Curve> {
    let mut curves = vec![Curve::default(); components];
    for (time, values) in rows {
        for (curve, value) in curves.iter_mut().zip(values) {
            curve.keyframes.push(Keyframe {
                time,
                value,
                interpolation: Interpolation::Linear,
            });
        }
    }
    curves
}

fn vector_track(
    target: &str,
    property: TrackProperty,
    keys: &[VectorKey],
    ticks_per_second: f64,
    convert: impl Fn(&Vector3<f32>) -> Vector3<f32>,
) -> AnimationTrack {
    let last_tick = keys.last().map(|key| key.time).unwrap_or(0.0);
    let (duration_ms, normalize) = timeline(last_tick, ticks_per_second);
    let rows = keys.iter().map(|key| {
        let value = convert(&key.value);
        (normalize(key.time), vec![value.x, value.y, value.z])
    });
    AnimationTrack {
        target: target.to_string(),
        property,
        duration_ms,
        curves: curves_from(rows, property.component_count()),
    }
}

fn quaternion_track(target: &str, keys: &[QuatKey], ticks_per_second: f64) -> AnimationTrack {
    let last_tick = keys.last().map(|key| key.time).unwrap_or(0.0);
    let (duration_ms, normalize) = timeline(last_tick, ticks_per_second);
    let rows = keys
        .iter()
        .map(|key| (normalize(key.time), key.value.to_vec()));
    AnimationTrack {
        target: target.to_string(),
        property: TrackProperty::Quaternion,
        duration_ms,
        curves: curves_from(rows, TrackProperty::Quaternion.component_count()),
    }
}

// ─── Simplification ───────────────────────────────────────────────────────────

/// Single left-to-right pass removing interior keys that lie within
/// `threshold × chord` of the segment through their neighbors. After a
/// removal the same index is tested again against the reduced curve.
pub fn simplify_vector_track(track: &mut AnimationTrack, threshold: f32) -> usize {
    simplify_with(track, |k0, k1, k2| {
        let k0 = Vector3::new(k0[0], k0[1], k0[2]);
        let k1 = Vector3::new(k1[0], k1[1], k1[2]);
        let k2 = Vector3::new(k2[0], k2[1], k2[2]);
        vector_key_removable(&k0, &k1, &k2, threshold)
    })
}

/// Same pass over `[x, y, z, w]` keys, removing interior rotations that are
/// a same-axis, same-direction fraction of the rotation between neighbors.
pub fn simplify_quaternion_track(track: &mut AnimationTrack, threshold: f32) -> usize {
    simplify_with(track, |k0, k1, k2| {
        quaternion_key_removable(&to_quaternion(k0), &to_quaternion(k1), &to_quaternion(k2), threshold)
    })
}

fn simplify_with(
    track: &mut AnimationTrack,
    removable: impl Fn(&[f32], &[f32], &[f32]) -> bool,
) -> usize {
    let mut removed = 0;
    let mut index = 1;
    while index + 1 < track.keyframe_count() {
        let k0 = track.sample_at(index - 1);
        let k1 = track.sample_at(index);
        let k2 = track.sample_at(index + 1);
        if removable(&k0, &k1, &k2) {
            track.remove_keyframe(index);
            removed += 1;
        } else {
            index += 1;
        }
    }
    removed
}

fn vector_key_removable(
    k0: &Vector3<f32>,
    k1: &Vector3<f32>,
    k2: &Vector3<f32>,
    threshold: f32,
) -> bool {
    let chord = k2 - k0;
    let projection = k1.dot(&chord);
    let (start, end) = (k0.dot(&chord), k2.dot(&chord));
    if projection < start.min(end) || projection > start.max(end) {
        return false;
    }

    let chord_length_squared = chord.norm_squared();
    let t = if chord_length_squared > 0.0 {
        ((k1 - k0).dot(&chord) / chord_length_squared).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = k0 + chord * t;
    (k1 - closest).norm() <= threshold * chord_length_squared.sqrt()
}

fn to_quaternion(values: &[f32]) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(Quaternion::new(values[3], values[0], values[1], values[2]))
}

/// Axis and signed angle in `(-π, π]`.
fn signed_axis_angle(rotation: &UnitQuaternion<f32>) -> (Vector3<f32>, f32) {
    let imaginary = rotation.imag();
    let length = imaginary.norm();
    let mut angle = 2.0 * length.atan2(rotation.w);
    if angle > PI {
        angle -= 2.0 * PI;
    }
    let axis = if length > ANGLE_EPSILON {
        imaginary / length
    } else {
        Vector3::x()
    };
    (axis, angle)
}

fn quaternion_key_removable(
    k0: &UnitQuaternion<f32>,
    k1: &UnitQuaternion<f32>,
    k2: &UnitQuaternion<f32>,
    threshold: f32,
) -> bool {
    // Spike: neighbors agree but the interior key departs from them.
    if k0.angle_to(k2) < ANGLE_EPSILON && k0.angle_to(k1) >= ANGLE_EPSILON {
        return false;
    }

    let inverse = k0.inverse();
    let r1 = inverse * k1;
    let r0 = inverse * k2;
    let (mut v0, mut a0) = signed_axis_angle(&r0);
    let (v1, a1) = signed_axis_angle(&r1);

    if a0.abs() > threshold {
        return false;
    }
    if a0.abs() < ANGLE_EPSILON {
        return a1.abs() < ANGLE_EPSILON;
    }
    if a1.abs() < ANGLE_EPSILON {
        return true;
    }

    if v1.dot(&v0) < 0.0 {
        v0 = -v0;
        a0 = -a0;
    }
    if v0.angle(&v1) / PI > threshold {
        return false;
    }
    if a0.signum() != a1.signum() {
        return false;
    }
    (0.0..=1.0).contains(&(a1 / a0))
}

use nalgebra::{Matrix3, Matrix4, Point3, Translation3, UnitQuaternion, Vector3};

// ─── TRS composition ──────────────────────────────────────────────────────────

/// Decomposed translation / rotation / scale of an affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposed {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Decomposed {
    /// Rotation as XYZ Euler angles (roll, pitch, yaw) in radians.
    pub fn euler(&self) -> Vector3<f32> {
        let (roll, pitch, yaw) = self.rotation.euler_angles();
        Vector3::new(roll, pitch, yaw)
    }
}

/// Build a local transform matrix from position, Euler rotation and scale.
pub fn compose_trs(
    position: &Vector3<f32>,
    euler: &Vector3<f32>,
    scale: &Vector3<f32>,
) -> Matrix4<f32> {
    let translation_matrix = Translation3::from(*position).to_homogeneous();
    let rotation_matrix = UnitQuaternion::from_euler_angles(euler.x, euler.y, euler.z).to_homogeneous();
    let scale_matrix = Matrix4::new_nonuniform_scaling(scale);
    translation_matrix * rotation_matrix * scale_matrix
}

/// Split an affine matrix into translation, rotation and (possibly negative) scale.
pub fn decompose(matrix: &Matrix4<f32>) -> Decomposed {
    let translation = Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);

    let basis_x = Vector3::new(matrix[(0, 0)], matrix[(1, 0)], matrix[(2, 0)]);
    let basis_y = Vector3::new(matrix[(0, 1)], matrix[(1, 1)], matrix[(2, 1)]);
    let basis_z = Vector3::new(matrix[(0, 2)], matrix[(1, 2)], matrix[(2, 2)]);

    let mut scale_x = basis_x.norm();
    let scale_y = basis_y.norm();
    let scale_z = basis_z.norm();

    let mut rot_x = if scale_x > 1e-8 {
        basis_x / scale_x
    } else {
        Vector3::x()
    };
    let rot_y = if scale_y > 1e-8 {
        basis_y / scale_y
    } else {
        Vector3::y()
    };
    let rot_z = if scale_z > 1e-8 {
        basis_z / scale_z
    } else {
        Vector3::z()
    };

    if rot_x.cross(&rot_y).dot(&rot_z) < 0.0 {
        scale_x = -scale_x;
        rot_x = -rot_x;
    }

    let rotation_matrix = Matrix3::from_columns(&[rot_x, rot_y, rot_z]);

    Decomposed {
        translation,
        rotation: UnitQuaternion::from_matrix(&rotation_matrix),
        scale: Vector3::new(scale_x, scale_y, scale_z),
    }
}

/// Transform a point by an affine matrix.
pub fn transform_point(matrix: &Matrix4<f32>, point: &Vector3<f32>) -> Vector3<f32> {
    matrix.transform_point(&Point3::from(*point)).coords
}

/// Transform a direction by the linear part of a matrix and renormalize it.
pub fn transform_direction(matrix: &Matrix4<f32>, direction: &Vector3<f32>) -> Vector3<f32> {
    let transformed = matrix.transform_vector(direction);
    let length = transformed.norm();
    if length > 1e-8 {
        transformed / length
    } else {
        transformed
    }
}

// ─── Axis / unit conversion ───────────────────────────────────────────────────

/// Change of basis from source space into engine space: uniform scale plus an
/// optional Z-up → Y-up remap `(x, y, z) → (−x, z, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisConversion {
    pub scale: f32,
    pub flip_z_up: bool,
}

impl AxisConversion {
    pub fn new(scale: f32, flip_z_up: bool) -> Self {
        Self { scale, flip_z_up }
    }

    /// Remap an axis-aligned triple without scaling.
    pub fn remap(&self, v: &Vector3<f32>) -> Vector3<f32> {
        if self.flip_z_up {
            Vector3::new(-v.x, v.z, v.y)
        } else {
            *v
        }
    }

    /// Convert a source-space point (scaled and remapped).
    pub fn point(&self, v: &Vector3<f32>) -> Vector3<f32> {
        self.remap(v) * self.scale
    }

    /// Convert a source-space direction (remapped only).
    pub fn direction(&self, v: &Vector3<f32>) -> Vector3<f32> {
        self.remap(v)
    }

    /// Convert a per-axis scale triple; the remap is a proper rotation so no sign flips.
    pub fn axis_scale(&self, v: &Vector3<f32>) -> Vector3<f32> {
        if self.flip_z_up {
            Vector3::new(v.x, v.z, v.y)
        } else {
            *v
        }
    }

    /// Conjugate a rotation into engine space.
    pub fn rotation(&self, rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        if !self.flip_z_up {
            return *rotation;
        }
        let basis = Self::remap_matrix();
        let conjugated = basis * rotation.to_rotation_matrix().into_inner() * basis.transpose();
        UnitQuaternion::from_matrix(&conjugated)
    }

    /// Convert a full source-space transform: `B · M · B⁻¹`.
    pub fn matrix(&self, matrix: &Matrix4<f32>) -> Matrix4<f32> {
        let basis = self.basis();
        let inverse = self.inverse_basis();
        basis * matrix * inverse
    }

    /// Convert a decomposed source transform component-wise.
    pub fn decomposed(&self, source: &Decomposed) -> Decomposed {
        Decomposed {
            translation: self.point(&source.translation),
            rotation: self.rotation(&source.rotation),
            scale: self.axis_scale(&source.scale),
        }
    }

    fn remap_matrix() -> Matrix3<f32> {
        Matrix3::new(-1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0)
    }

    fn basis(&self) -> Matrix4<f32> {
        let remap = if self.flip_z_up {
            Self::remap_matrix()
        } else {
            Matrix3::identity()
        };
        (remap * self.scale).to_homogeneous()
    }

    fn inverse_basis(&self) -> Matrix4<f32> {
        let remap = if self.flip_z_up {
            Self::remap_matrix().transpose()
        } else {
            Matrix3::identity()
        };
        let inverse_scale = if self.scale.abs() > 1e-12 {
            1.0 / self.scale
        } else {
            1.0
        };
        (remap * inverse_scale).to_homogeneous()
    }
}

// ─── Bind matrices ────────────────────────────────────────────────────────────

/// Inverse of a joint's bind-time world matrix, given its parent joint's bind
/// world matrix and its own rest transform. `None` for a degenerate joint.
pub fn joint_inverse_bind(
    parent_bind_world: &Matrix4<f32>,
    joint_rest: &Matrix4<f32>,
) -> Option<Matrix4<f32>> {
    (parent_bind_world * joint_rest).try_inverse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: &Matrix4<f32>, b: &Matrix4<f32>) -> bool {
        (a - b).norm() < 1e-4
    }

    #[test]
    fn given_trs_when_decomposing_composed_matrix_then_components_are_recovered() {
        let position = Vector3::new(1.0, 2.0, 3.0);
        let euler = Vector3::new(0.3, -0.2, 0.8);
        let scale = Vector3::new(2.0, 1.0, 0.5);
        let matrix = compose_trs(&position, &euler, &scale);

        let parts = decompose(&matrix);
        assert!((parts.translation - position).norm() < 1e-5);
        assert!((parts.scale - scale).norm() < 1e-5);
        assert!((parts.euler() - euler).norm() < 1e-4);
    }

    #[test]
    fn given_z_up_conversion_when_converting_point_then_axes_are_remapped_and_scaled() {
        let conversion = AxisConversion::new(2.0, true);
        let converted = conversion.point(&Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(converted, Vector3::new(-2.0, 6.0, 4.0));
    }

    #[test]
    fn given_conversion_when_converting_matrix_then_it_matches_componentwise_conversion() {
        let conversion = AxisConversion::new(0.5, true);
        let matrix = compose_trs(
            &Vector3::new(1.0, -2.0, 4.0),
            &Vector3::new(0.1, 0.7, -0.4),
            &Vector3::new(1.0, 1.0, 1.0),
        );

        let whole = conversion.matrix(&matrix);
        let parts = conversion.decomposed(&decompose(&matrix));
        let rebuilt = compose_trs(&parts.translation, &parts.euler(), &parts.scale);

        assert!(approx_eq(&whole, &rebuilt));
    }

    #[test]
    fn given_spine_under_turned_hips_when_inverting_bind_then_spine_joint_maps_to_origin() {
        let hips = compose_trs(
            &Vector3::new(0.0, 1.0, 0.0),
            &Vector3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            &Vector3::new(1.0, 1.0, 1.0),
        );
        let spine = compose_trs(
            &Vector3::new(0.0, 0.25, 0.1),
            &Vector3::new(0.2, 0.0, 0.0),
            &Vector3::new(1.0, 1.0, 1.0),
        );
        let spine_world = transform_point(&(hips * spine), &Vector3::zeros());

        let inverse = joint_inverse_bind(&hips, &spine).expect("spine bind is invertible");

        assert!(transform_point(&inverse, &spine_world).norm() < 1e-5);
        let above_spine = spine_world + Vector3::new(0.0, 0.5, 0.0);
        assert!(transform_point(&inverse, &above_spine).norm() > 0.4);
    }

    #[test]
    fn given_collapsed_joint_scale_when_inverting_bind_then_no_matrix_is_produced() {
        let hips = Matrix4::identity();
        let collapsed = compose_trs(
            &Vector3::new(0.0, 0.5, 0.0),
            &Vector3::zeros(),
            &Vector3::new(1.0, 0.0, 1.0),
        );

        assert_eq!(joint_inverse_bind(&hips, &collapsed), None);
    }
}

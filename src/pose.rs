//! Bone hierarchies and the conversion of parent-relative transforms into
//! model space.
use glam::{Quat, Vec3};

/// Translation, rotation and scale of one bone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
  /// Translation.
  pub translation: Vec3,
  /// Rotation as a unit quaternion.
  pub rotation: Quat,
  /// Per-axis scale.
  pub scale: Vec3,
}

impl Transform {
  /// No translation, no rotation, unit scale.
  pub const IDENTITY: Transform = Transform {
    translation: Vec3::ZERO,
    rotation: Quat::IDENTITY,
    scale: Vec3::ONE,
  };

  /// `local` expressed in the space `self` lives in.
  ///
  /// Translation is rotated by the parent but not scaled by it.
  pub fn then(&self, local: &Transform) -> Transform {
    Transform {
      translation: self.rotation * local.translation + self.translation,
      rotation: self.rotation * local.rotation,
      scale: local.scale * self.scale,
    }
  }

  /// Component-wise comparison within `max_abs_diff`.
  pub fn abs_diff_eq(&self, other: &Transform, max_abs_diff: f32) -> bool {
    self.translation.abs_diff_eq(other.translation, max_abs_diff)
      && self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
      && self.scale.abs_diff_eq(other.scale, max_abs_diff)
  }
}

impl Default for Transform {
  fn default() -> Transform {
    Transform::IDENTITY
  }
}

/// A bone's name and its parent, `-1` for roots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoneInfo {
  /// Bone name.
  pub name: String,
  /// Index of the parent bone, or `-1`.
  pub parent: i32,
}

/// Bones plus their rest pose in model space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skeleton {
  /// Bones, parents before children.
  pub bones: Vec<BoneInfo>,
  /// Model-space rest transform of every bone.
  pub bind_pose: Vec<Transform>,
}

/// Turns parent-relative transforms into model-space ones, in place.
///
/// Bones are visited in index order, so a parent must come before its
/// children. A bone whose parent index is not smaller than its own is left
/// in its local space.
pub fn compose_pose(bones: &[BoneInfo], pose: &mut [Transform]) {
  for (i, bone) in bones.iter().enumerate().take(pose.len()) {
    if bone.parent < 0 {
      continue;
    }
    let parent = bone.parent as usize;
    if parent >= i {
      log::warn!(
        "bone {} (`{}`) has parent {} which does not precede it; left uncomposed",
        i,
        bone.name,
        parent
      );
      continue;
    }

    let (composed, rest) = pose.split_at_mut(i);
    rest[0] = composed[parent].then(&rest[0]);
  }
}

#[cfg(test)]
fn bone(name: &str, parent: i32) -> BoneInfo {
  BoneInfo {
    name: name.to_owned(),
    parent,
  }
}

#[test]
fn test_child_inherits_root_translation() {
  let bones = vec![bone("root", -1), bone("child", 0)];
  let mut pose = vec![
    Transform {
      translation: Vec3::new(0., 1., 0.),
      ..Transform::IDENTITY
    },
    Transform {
      translation: Vec3::new(1., 0., 0.),
      ..Transform::IDENTITY
    },
  ];
  compose_pose(&bones, &mut pose);
  assert!(pose[1]
    .translation
    .abs_diff_eq(Vec3::new(1., 1., 0.), 1e-6));
}

#[test]
fn test_rotation_and_scale_propagate_down_a_chain() {
  let quarter = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
  let bones = vec![bone("a", -1), bone("b", 0), bone("c", 1)];
  let mut pose = vec![
    Transform {
      rotation: quarter,
      scale: Vec3::splat(2.),
      ..Transform::IDENTITY
    },
    Transform {
      translation: Vec3::X,
      ..Transform::IDENTITY
    },
    Transform {
      translation: Vec3::X,
      scale: Vec3::new(1., 3., 1.),
      ..Transform::IDENTITY
    },
  ];
  compose_pose(&bones, &mut pose);

  // X rotated a quarter turn about Z is Y; parent scale does not apply.
  assert!(pose[1].translation.abs_diff_eq(Vec3::Y, 1e-6));
  assert!(pose[2].translation.abs_diff_eq(Vec3::new(0., 2., 0.), 1e-6));
  assert!(pose[2].rotation.abs_diff_eq(quarter, 1e-6));
  assert!(pose[2].scale.abs_diff_eq(Vec3::new(2., 6., 2.), 1e-6));
}

#[test]
fn test_out_of_order_parent_is_left_local() {
  let bones = vec![bone("child", 1), bone("root", -1), bone("self", 2)];
  let local = Transform {
    translation: Vec3::new(1., 0., 0.),
    ..Transform::IDENTITY
  };
  let mut pose = vec![local, local, local];
  compose_pose(&bones, &mut pose);
  assert_eq!(pose, vec![local, local, local]);
}

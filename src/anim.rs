//! Skeletal animations from `.iqm` files, and CPU skinning of a [`Model`]
//! with them.
use glam::{Quat, Vec3, Vec4};

use crate::error::{vec_with_capacity, Error, Result};
use crate::iqm::{self, Anim, Header, Joint, Pose, Reader};
use crate::model::{Mesh, Model};
use crate::pose::{compose_pose, BoneInfo, Transform};

/// Bone name used when a file has poses but no joints to name them.
pub const PLACEHOLDER_BONE_NAME: &str = "ANIMJOINTNAME";

/// One named animation: a model-space pose of every bone, per frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Animation {
  /// Animation name.
  pub name: String,
  /// Frames per second, as stored in the file.
  pub framerate: f32,
  /// Bones the poses refer to.
  pub bones: Vec<BoneInfo>,
  /// `frame_poses[frame][bone]`.
  pub frame_poses: Vec<Vec<Transform>>,
}

impl Animation {
  /// Number of bones per frame.
  pub fn bone_count(&self) -> usize {
    self.bones.len()
  }

  /// Number of frames.
  pub fn frame_count(&self) -> usize {
    self.frame_poses.len()
  }

  /// Whether this animation drives `model`'s skeleton: same bone count and
  /// the same parent for every bone.
  pub fn is_valid_for(&self, model: &Model) -> bool {
    match &model.skeleton {
      Some(skeleton) => {
        skeleton.bones.len() == self.bones.len()
          && skeleton
            .bones
            .iter()
            .zip(&self.bones)
            .all(|(a, b)| a.parent == b.parent)
      }
      None => false,
    }
  }
}

/// Decodes one bone's local transform for the current frame, consuming one
/// frame value per channel set in the pose's mask.
fn decode_pose(pose: &Pose, frames: &[u16], cursor: &mut usize) -> Result<Transform> {
  let mut channels = pose.channeloffset;
  for (i, channel) in channels.iter_mut().enumerate() {
    if pose.mask & (1 << i) == 0 {
      continue;
    }
    let raw = *frames.get(*cursor).ok_or_else(|| {
      Error::MalformedInput(format!(
        "frame data ends at {} values",
        frames.len()
      ))
    })?;
    *channel += raw as f32 * pose.channelscale[i];
    *cursor += 1;
  }

  let rotation = Vec4::new(channels[3], channels[4], channels[5], channels[6]);
  let rotation = if rotation.length_squared() > 0. {
    rotation.normalize()
  } else {
    rotation
  };

  Ok(Transform {
    translation: Vec3::new(channels[0], channels[1], channels[2]),
    rotation: Quat::from_vec4(rotation),
    scale: Vec3::new(channels[7], channels[8], channels[9]),
  })
}

fn decode_animation(
  reader: &Reader<'_>,
  header: &Header,
  anim: &Anim,
  bones: &[BoneInfo],
  poses: &[Pose],
  frames: &[u16],
) -> Result<Animation> {
  let last_frame = anim.first_frame as u64 + anim.num_frames as u64;
  if last_frame > header.num_frames as u64 {
    return Err(Error::MalformedInput(format!(
      "animation frames {}..{} outside of {}",
      anim.first_frame, last_frame, header.num_frames
    )));
  }

  let mut cursor = anim.first_frame as usize * header.num_framechannels as usize;
  let mut frame_poses = vec_with_capacity(anim.num_frames as usize)?;

  for _ in 0..anim.num_frames {
    let mut frame = vec_with_capacity(poses.len())?;
    for pose in poses {
      frame.push(decode_pose(pose, frames, &mut cursor)?);
    }
    compose_pose(bones, &mut frame);
    frame_poses.push(frame);
  }

  Ok(Animation {
    name: reader.text(anim.name)?,
    framerate: anim.framerate,
    bones: bones.to_vec(),
    frame_poses,
  })
}

/// Loads every animation in an `.iqm` file.
///
/// A buffer with the wrong signature or version gives no animations rather
/// than an error.
pub fn load_iqm_animations(bytes: &[u8]) -> Result<Vec<Animation>> {
  let header = match iqm::open(bytes)? {
    Some(header) => header,
    None => return Ok(vec![]),
  };
  let reader = Reader::new(bytes, &header)?;

  let poses = reader.read_vec::<Pose>("poses", header.ofs_poses, header.num_poses as usize)?;
  let anims = reader.read_vec::<Anim>("anims", header.ofs_anims, header.num_anims as usize)?;
  let frames = reader.read_vec::<u16>(
    "frames",
    header.ofs_frames,
    header.num_frames as usize * header.num_framechannels as usize,
  )?;
  let joints = reader.read_vec::<Joint>("joints", header.ofs_joints, header.num_joints as usize)?;

  let mut bones = vec_with_capacity(poses.len())?;
  for (i, pose) in poses.iter().enumerate() {
    let name = match joints.get(i) {
      Some(joint) => reader.text(joint.name)?,
      None => PLACEHOLDER_BONE_NAME.to_owned(),
    };
    bones.push(BoneInfo {
      name,
      parent: pose.parent,
    });
  }

  let mut animations = vec_with_capacity(anims.len())?;
  for anim in &anims {
    animations.push(decode_animation(
      &reader,
      &header,
      anim,
      &bones,
      &poses,
      &frames,
    )?);
  }

  log::debug!(
    "iqm: {} animations over {} bones",
    animations.len(),
    bones.len()
  );
  Ok(animations)
}

fn skin_mesh(mesh: &mut Mesh, bind_pose: &[Transform], pose: &[Transform]) {
  if !mesh.is_skinned() {
    return;
  }
  let Mesh {
    vertices,
    normals,
    bone_ids,
    bone_weights,
    anim_vertices,
    anim_normals,
    ..
  } = mesh;

  for (i, vertex) in vertices.iter().enumerate() {
    let (ids, weights) = match (bone_ids.get(i), bone_weights.get(i)) {
      (Some(ids), Some(weights)) => (ids, weights),
      _ => break,
    };
    let vertex = Vec3::from_array(*vertex);
    let normal = normals.get(i).map(|n| Vec3::from_array(*n));

    let mut skinned = Vec3::ZERO;
    let mut skinned_normal = Vec3::ZERO;
    for (&id, &weight) in ids.iter().zip(weights) {
      if weight == 0. {
        continue;
      }
      let (bind, current) = match (bind_pose.get(id as usize), pose.get(id as usize)) {
        (Some(bind), Some(current)) => (bind, current),
        _ => continue,
      };
      let rotation = current.rotation * bind.rotation.inverse();
      let moved = rotation * ((vertex - bind.translation) * current.scale) + current.translation;
      skinned += moved * weight;
      if let Some(normal) = normal {
        skinned_normal += rotation * normal * weight;
      }
    }

    if let Some(out) = anim_vertices.get_mut(i) {
      *out = skinned.to_array();
    }
    if let Some(out) = anim_normals.get_mut(i) {
      *out = skinned_normal.to_array();
    }
  }
}

impl Model {
  /// Skins every mesh on the CPU into `anim_vertices` and `anim_normals`
  /// for `frame` of `anim`, wrapping past the last frame.
  ///
  /// Does nothing for a model without a skeleton or an empty animation.
  pub fn update_animation(&mut self, anim: &Animation, frame: usize) {
    let skeleton = match &self.skeleton {
      Some(skeleton) => skeleton,
      None => return,
    };
    if anim.frame_count() == 0 {
      return;
    }
    let pose = &anim.frame_poses[frame % anim.frame_count()];
    for mesh in &mut self.meshes {
      skin_mesh(mesh, &skeleton.bind_pose, pose);
    }
  }
}

#[cfg(test)]
fn identity_channels() -> [f32; 10] {
  [0., 0., 0., 0., 0., 0., 1., 1., 1., 1.]
}

#[cfg(test)]
fn two_pose_file() -> iqm::fixture::IqmBuilder {
  let mut b = iqm::fixture::IqmBuilder::new();
  let walk = b.text("walk");
  let tail = b.text("tail");

  let mut still = identity_channels();
  still[0] = 1.;
  still[1] = 2.;
  still[2] = 3.;
  let mut tx_scale = [0.; 10];
  tx_scale[0] = 0.5;

  b.poses = vec![
    // Constant: reads no frame data.
    Pose {
      parent: -1,
      mask: 0,
      channeloffset: still,
      channelscale: [0.; 10],
    },
    // Translation x animated.
    Pose {
      parent: -1,
      mask: 0b1,
      channeloffset: identity_channels(),
      channelscale: tx_scale,
    },
  ];
  b.num_framechannels = 1;
  b.frames = vec![2, 4, 6];
  b.anims = vec![
    Anim {
      name: walk,
      first_frame: 0,
      num_frames: 3,
      framerate: 24.,
      flags: 0,
    },
    Anim {
      name: tail,
      first_frame: 1,
      num_frames: 2,
      framerate: 30.,
      flags: 0,
    },
  ];
  b
}

#[test]
fn test_masked_channels_consume_frame_data() {
  let anims = load_iqm_animations(&two_pose_file().build()).unwrap();
  assert_eq!(anims.len(), 2);

  let walk = &anims[0];
  assert_eq!(walk.name, "walk");
  assert_eq!(walk.framerate, 24.);
  assert_eq!(walk.frame_count(), 3);
  assert_eq!(walk.bone_count(), 2);
  for (frame, x) in walk.frame_poses.iter().zip([1., 2., 3.]) {
    assert_eq!(frame[0].translation, Vec3::new(1., 2., 3.));
    assert_eq!(frame[0].rotation, Quat::IDENTITY);
    assert_eq!(frame[1].translation, Vec3::new(x, 0., 0.));
  }

  let tail = &anims[1];
  assert_eq!(tail.frame_poses[0][1].translation.x, 2.);
  assert_eq!(tail.frame_poses[1][1].translation.x, 3.);
}

#[test]
fn test_bones_without_joints_get_placeholder_names() {
  let anims = load_iqm_animations(&two_pose_file().build()).unwrap();
  assert!(anims[0]
    .bones
    .iter()
    .all(|bone| bone.name == PLACEHOLDER_BONE_NAME));
}

#[test]
fn test_bones_take_joint_names_and_compose() {
  let mut b = two_pose_file();
  let hip = b.text("hip");
  let knee = b.text("knee");
  b.poses[1].parent = 0;
  b.joints = vec![
    Joint {
      name: hip,
      parent: -1,
      rotate: [0., 0., 0., 1.],
      scale: [1.; 3],
      ..Joint::default()
    },
    Joint {
      name: knee,
      parent: 0,
      rotate: [0., 0., 0., 1.],
      scale: [1.; 3],
      ..Joint::default()
    },
  ];
  let anims = load_iqm_animations(&b.build()).unwrap();
  let walk = &anims[0];
  assert_eq!(walk.bones[0].name, "hip");
  assert_eq!(walk.bones[1].name, "knee");
  assert_eq!(walk.bones[1].parent, 0);
  // Model space: the child sits on top of the parent's translation.
  assert!(walk.frame_poses[2][1]
    .translation
    .abs_diff_eq(Vec3::new(4., 2., 3.), 1e-6));
}

#[test]
fn test_rotation_is_normalized() {
  let mut channels = identity_channels();
  channels[6] = 2.;
  let pose = Pose {
    parent: -1,
    mask: 0,
    channeloffset: channels,
    channelscale: [0.; 10],
  };
  let mut cursor = 0;
  let transform = decode_pose(&pose, &[], &mut cursor).unwrap();
  assert!(transform.rotation.abs_diff_eq(Quat::IDENTITY, 1e-6));
  assert_eq!(cursor, 0);

  channels[6] = 0.;
  let zero = Pose {
    channeloffset: channels,
    ..pose
  };
  let transform = decode_pose(&zero, &[], &mut cursor).unwrap();
  assert_eq!(transform.rotation, Quat::from_xyzw(0., 0., 0., 0.));
}

#[test]
fn test_short_frame_data_is_malformed() {
  let mut b = two_pose_file();
  // Two animated channels per frame, but only one stored.
  b.poses[1].mask = 0b11;
  b.frames = vec![1];
  b.anims.truncate(1);
  b.anims[0].num_frames = 1;
  assert!(matches!(
    load_iqm_animations(&b.build()),
    Err(Error::MalformedInput(_))
  ));
}

#[test]
fn test_wrong_version_gives_no_animations() {
  let mut b = two_pose_file();
  b.version = 3;
  assert!(load_iqm_animations(&b.build()).unwrap().is_empty());
}

#[cfg(test)]
fn skinned_model() -> Model {
  use crate::pose::Skeleton;

  Model {
    meshes: vec![Mesh {
      vertices: vec![[0., 0., 0.], [1., 0., 0.]],
      normals: vec![[1., 0., 0.], [1., 0., 0.]],
      bone_ids: vec![[0, 0, 0, 0], [0, 1, 0, 0]],
      bone_weights: vec![[1., 0., 0., 0.], [0.5, 0.5, 0., 0.]],
      anim_vertices: vec![[0., 0., 0.], [1., 0., 0.]],
      anim_normals: vec![[1., 0., 0.], [1., 0., 0.]],
      ..Mesh::default()
    }],
    skeleton: Some(Skeleton {
      bones: vec![
        BoneInfo {
          name: "root".to_owned(),
          parent: -1,
        },
        BoneInfo {
          name: "arm".to_owned(),
          parent: 0,
        },
      ],
      bind_pose: vec![Transform::IDENTITY, Transform::IDENTITY],
    }),
    ..Model::default()
  }
}

#[cfg(test)]
fn animation_of(frames: Vec<Vec<Transform>>) -> Animation {
  Animation {
    name: "test".to_owned(),
    framerate: 30.,
    bones: skinned_model().skeleton.unwrap().bones,
    frame_poses: frames,
  }
}

#[test]
fn test_update_animation_skins_vertices() {
  let mut model = skinned_model();
  let quarter = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
  let anim = animation_of(vec![
    vec![Transform::IDENTITY, Transform::IDENTITY],
    vec![
      Transform {
        translation: Vec3::new(0., 0., 1.),
        ..Transform::IDENTITY
      },
      Transform {
        rotation: quarter,
        ..Transform::IDENTITY
      },
    ],
  ]);
  assert!(anim.is_valid_for(&model));

  // Frame 3 wraps to frame 1.
  model.update_animation(&anim, 3);
  let mesh = &model.meshes[0];
  assert_eq!(mesh.anim_vertices[0], [0., 0., 1.]);
  // Half translated by the root, half rotated onto +Y by the arm.
  let v = Vec3::from_array(mesh.anim_vertices[1]);
  assert!(v.abs_diff_eq(Vec3::new(0.5, 0.5, 0.5), 1e-6));
  let n = Vec3::from_array(mesh.anim_normals[1]);
  assert!(n.abs_diff_eq(Vec3::new(0.5, 0.5, 0.), 1e-6));
  // Bind data is untouched.
  assert_eq!(mesh.vertices[1], [1., 0., 0.]);

  model.update_animation(&anim, 0);
  assert_eq!(model.meshes[0].anim_vertices[1], [1., 0., 0.]);
}

#[test]
fn test_animation_validity() {
  let model = skinned_model();
  let mut anim = animation_of(vec![]);
  assert!(anim.is_valid_for(&model));

  anim.bones[1].parent = -1;
  assert!(!anim.is_valid_for(&model));

  anim.bones.pop();
  assert!(!anim.is_valid_for(&model));

  assert!(!animation_of(vec![]).is_valid_for(&Model::default()));

  // No frames: nothing changes.
  let mut model = skinned_model();
  let before = model.clone();
  model.update_animation(&animation_of(vec![]), 5);
  assert_eq!(model, before);
}

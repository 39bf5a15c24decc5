use std::fs;
use std::path::{Path, PathBuf};

use glam::{EulerRot, Mat4, Quat, Vec3};
use log::{debug, info, warn};
use serde::Deserialize;

use super::{Scene, SceneObject};
use crate::{BvhConfig, BvhError, Result};

pub const CONFIG_VERSION: &str = "0.1";

#[derive(Debug, Deserialize)]
struct SceneDescription {
    version: Option<String>,
    #[serde(default)]
    bvh: BvhConfig,
    #[serde(default)]
    surfaces: Vec<SurfaceDescription>,
}

#[derive(Debug, Deserialize)]
struct SurfaceDescription {
    name: Option<String>,
    file: Option<PathBuf>,
    translate: Option<[f32; 3]>,
    /// Degrees, applied X then Y then Z.
    rotate: Option<[f32; 3]>,
    scale: Option<[f32; 3]>,
}

impl SurfaceDescription {
    fn transform(&self) -> Mat4 {
        let translate = self.translate.map(Vec3::from_array).unwrap_or(Vec3::ZERO);
        let scale = self.scale.map(Vec3::from_array).unwrap_or(Vec3::ONE);
        let [x, y, z] = self.rotate.unwrap_or([0.0; 3]);
        let rotation = Quat::from_euler(EulerRot::XYZ, x.to_radians(), y.to_radians(), z.to_radians());
        Mat4::from_scale_rotation_translation(scale, rotation, translate)
    }
}

impl Scene {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let scene = Self::from_yaml_str(&contents, base_dir)?;
        info!("Loaded scene {:?}: {} objects", path, scene.len());
        Ok(scene)
    }

    /// Parses a scene description. Mesh paths are resolved against `base_dir`.
    pub fn from_yaml_str(contents: &str, base_dir: &Path) -> Result<Self> {
        let description: SceneDescription = serde_yaml::from_str(contents)?;

        let version = description
            .version
            .ok_or_else(|| BvhError::MissingField("version".to_string()))?;
        if version != CONFIG_VERSION {
            return Err(BvhError::UnsupportedConfigVersion {
                found: version,
                expected: CONFIG_VERSION.to_string(),
            });
        }
        description.bvh.validate()?;

        let mut scene = Scene::new(description.bvh);
        for (i, surface) in description.surfaces.iter().enumerate() {
            let file = surface
                .file
                .as_ref()
                .ok_or_else(|| BvhError::MissingField(format!("file for surface {i}")))?;
            let transform = surface.transform();

            let mut objects = load_obj_mesh(&base_dir.join(file))?;
            if let Some(name) = &surface.name {
                let single = objects.len() == 1;
                for object in &mut objects {
                    object.name = if single {
                        name.clone()
                    } else {
                        format!("{name}:{}", object.name)
                    };
                }
            }
            for object in objects {
                scene.add_object(object.with_transform(transform));
            }
        }

        if scene.is_empty() {
            warn!("Scene description has no surfaces");
        }
        Ok(scene)
    }
}

/// Loads every model of an OBJ file as its own object, triangulated.
pub fn load_obj_mesh(path: &Path) -> Result<Vec<SceneObject>> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )?;

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let objects = models
        .into_iter()
        .enumerate()
        .map(|(i, model)| {
            let vertices = model
                .mesh
                .positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2]))
                .collect();
            let name = if model.name.is_empty() {
                format!("{stem}.{i}")
            } else {
                model.name
            };
            debug!(
                "Loaded model {:?} from {:?}: {} triangles",
                name,
                path,
                model.mesh.indices.len() / 3
            );
            SceneObject::new(name, vertices, model.mesh.indices)
        })
        .collect();
    Ok(objects)
}

use std::time::Instant;

use anyhow::{Context, Result};
use log::info;
use raytracer_bvh::Scene;
use raytracer_bvh::buffer_builder::BufferBuilder;

const USAGE: &str = "usage: bvh-build <scene.yaml> [out.bin]";

fn main() -> Result<()> {
    pretty_env_logger::init();

    let mut args = std::env::args().skip(1);
    let scene_path = args.next().context(USAGE)?;
    let output = args.next();

    let start = Instant::now();
    let scene = Scene::from_yaml_file(&scene_path)
        .with_context(|| format!("Failed to load scene {scene_path}"))?;
    let buffers = scene.build().context("Failed to build scene BVHs")?;

    for (object, stats) in scene.objects.iter().zip(&buffers.stats) {
        info!(
            "{}: {} triangles, {} nodes, {} leaves, max triangles in leaf {}, depth {}, {:.3} ms",
            object.name,
            stats.triangle_count,
            stats.node_count,
            stats.leaf_count,
            stats.max_leaf_triangles,
            stats.max_depth_reached,
            stats.build_time.as_secs_f64() * 1000.0
        );
    }

    let mut upload = BufferBuilder::with_capacity(buffers.upload_size());
    let offsets = buffers.pack_into(&mut upload);
    info!(
        "Upload: {} bytes (nodes @ {}, triangles @ {}, objects @ {})",
        upload.get_offset(),
        offsets.nodes,
        offsets.triangles,
        offsets.objects
    );

    if let Some(output) = output {
        buffers
            .save(&output)
            .with_context(|| format!("Failed to write {output}"))?;
        info!("Wrote {output}");
    }

    info!("Done in {:.4}s", start.elapsed().as_secs_f32());
    Ok(())
}

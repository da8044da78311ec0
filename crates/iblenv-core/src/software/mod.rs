//! Reference CPU backend.
//!
//! Every destination texel is computed independently from read-only inputs, so the
//! [`Execution::Parallel`] mode only changes how rows are scheduled. Serial and parallel
//! runs produce the same bits.

mod brdf;
mod convert;
mod diffuse;
mod resize;
mod specular;

pub use brdf::SoftwareBrdfIntegrator;
pub use convert::SoftwareConverter;
pub use diffuse::SoftwareDiffuseConvolver;
pub use resize::SoftwareResizer;
pub use specular::{SoftwareSpecularConvolver, MIRROR_LEVEL_SUPERSAMPLE};

use glam::Vec3;
use rayon::prelude::*;

use crate::cubemap::{self, texel_direction, CubeFace, Texel};

/// How the software backend schedules texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// One thread, texels in storage order.
    Serial,
    /// Rows distributed over the rayon thread pool.
    #[default]
    Parallel,
}

/// Fills the six faces of one `size`×`size` level by evaluating `shade` per texel.
pub(crate) fn render_level<F>(execution: Execution, size: u32, out: &mut [f32], shade: F)
where
    F: Fn(&Texel) -> Vec3 + Sync,
{
    debug_assert_eq!(out.len(), cubemap::level_texels(size, 0) * 3);

    match execution {
        Execution::Serial => cubemap::for_each_texel(size, |texel| {
            let o = texel.index * 3;
            out[o..o + 3].copy_from_slice(&shade(&texel).to_array());
        }),
        Execution::Parallel => {
            let side = size as usize;
            out.par_chunks_mut(side * 3)
                .enumerate()
                .for_each(|(row_index, row)| {
                    let face = CubeFace::ALL[row_index / side];
                    #[allow(clippy::cast_possible_truncation)]
                    let v = (row_index % side) as u32;
                    for (u, px) in (0..size).zip(row.chunks_exact_mut(3)) {
                        let texel = Texel {
                            face,
                            u,
                            v,
                            dir: texel_direction(face, u, v, size),
                            index: row_index * side + u as usize,
                        };
                        px.copy_from_slice(&shade(&texel).to_array());
                    }
                });
        }
    }
}

//! The `factor` subcommand: random batch in, accuracy report out.

use crate::residual::relative_residual;
use crate::{FactorArgs, Layout, Precision, ShapeArgs};
use anyhow::{Context, Result};
use lubatch_backend_cpu::HostBackend;
use lubatch_core::{Handle, Scalar, Workspace};
use lubatch_solver::{
    getf2_batched, getf2_npvt_batched, getf2_npvt_strided_batched, getf2_strided_batched,
    getrf_batched, getrf_npvt_batched, getrf_npvt_strided_batched, getrf_strided_batched,
};
use nalgebra::ComplexField;
use num_complex::{Complex32, Complex64};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

pub fn run(args: &FactorArgs) -> Result<()> {
    match args.shape.precision {
        Precision::S => run_typed::<f32>(args),
        Precision::D => run_typed::<f64>(args),
        Precision::C => run_typed::<Complex32>(args),
        Precision::Z => run_typed::<Complex64>(args),
    }
}

/// Bytes of workspace the configured call needs, via the handle's size query.
pub fn query_bytes<T: Scalar>(
    handle: &mut Handle<HostBackend>,
    shape: &ShapeArgs,
) -> Result<usize> {
    let lda = shape.m.max(1);
    let stride_a = lda.checked_mul(shape.n).context("matrix size overflows")?;
    let stride_p = shape.m.min(shape.n);

    handle.start_device_memory_size_query();
    call::<T>(
        handle,
        shape,
        Layout::Strided,
        &mut [],
        lda,
        stride_a,
        &mut [],
        stride_p,
        &mut [],
    )
    .context("workspace size query failed")?;
    Ok(handle.stop_device_memory_size_query()?)
}

fn run_typed<T: Scalar + ComplexField>(args: &FactorArgs) -> Result<()> {
    let shape = &args.shape;
    let (m, n, batch) = (shape.m, shape.n, shape.batch);
    let lda = m.max(1);
    let stride_a = lda.checked_mul(n).context("matrix size overflows")?;
    let total = stride_a.checked_mul(batch).context("batch size overflows")?;
    let k = m.min(n);

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut a: Vec<T> = (0..total)
        .map(|_| T::from_f64_parts(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect();
    let original = a.clone();
    let mut ipiv = vec![0i32; k * batch];
    let mut info = vec![0i32; batch];

    let mut handle = Handle::with_config(HostBackend::new(), shape.config()?);
    let bytes = query_bytes::<T>(&mut handle, shape)?;
    handle.set_workspace(Workspace::new(bytes));
    log::info!("Attached {} byte workspace", bytes);

    let start = Instant::now();
    call::<T>(
        &mut handle,
        shape,
        args.layout,
        &mut a,
        lda,
        stride_a,
        &mut ipiv,
        k,
        &mut info,
    )
    .with_context(|| format!("factoring {}x{} batch of {} ({}) failed", m, n, batch, T::PREFIX))?;
    let elapsed = start.elapsed();

    let singular = info.iter().filter(|&&s| s != 0).count();
    let max_residual = (0..batch)
        .map(|b| {
            let range = b * stride_a..(b + 1) * stride_a;
            let pivots = (!shape.no_pivot).then(|| &ipiv[b * k..(b + 1) * k]);
            relative_residual(&original[range.clone()], &a[range], pivots, m, n, lda)
        })
        .fold(0.0f64, f64::max);

    println!("matrices:      {} x {}x{} ({})", batch, m, n, T::PREFIX);
    println!("singular:      {}", singular);
    println!("max residual:  {:.3e}", max_residual);
    println!("elapsed:       {:.3} ms", elapsed.as_secs_f64() * 1e3);
    Ok(())
}

/// Dispatch to the entry point selected by the shape flags and layout.
#[allow(clippy::too_many_arguments)]
fn call<T: Scalar>(
    handle: &mut Handle<HostBackend>,
    shape: &ShapeArgs,
    layout: Layout,
    a: &mut [T],
    lda: usize,
    stride_a: usize,
    ipiv: &mut [i32],
    stride_p: usize,
    info: &mut [i32],
) -> lubatch_core::Result<()> {
    let (m, n, batch) = (shape.m, shape.n, shape.batch);
    let pivot = !shape.no_pivot;

    match layout {
        Layout::Strided => match (shape.unblocked, pivot) {
            (false, true) => getrf_strided_batched(
                handle, m, n, a, lda, stride_a, ipiv, stride_p, info, batch,
            ),
            (false, false) => {
                getrf_npvt_strided_batched(handle, m, n, a, lda, stride_a, info, batch)
            }
            (true, true) => getf2_strided_batched(
                handle, m, n, a, lda, stride_a, ipiv, stride_p, info, batch,
            ),
            (true, false) => {
                getf2_npvt_strided_batched(handle, m, n, a, lda, stride_a, info, batch)
            }
        },
        Layout::Pointer => {
            let mut mats: Vec<&mut [T]> = if stride_a == 0 {
                Vec::new()
            } else {
                a.chunks_mut(stride_a).collect()
            };
            match (shape.unblocked, pivot) {
                (false, true) => {
                    getrf_batched(handle, m, n, &mut mats, lda, ipiv, stride_p, info, batch)
                }
                (false, false) => getrf_npvt_batched(handle, m, n, &mut mats, lda, info, batch),
                (true, true) => {
                    getf2_batched(handle, m, n, &mut mats, lda, ipiv, stride_p, info, batch)
                }
                (true, false) => getf2_npvt_batched(handle, m, n, &mut mats, lda, info, batch),
            }
        }
    }
}

// This file is part of the open-source port of facelbp engine, which implements face detection
// using the Multi-scale Block Local Binary Pattern (MB-LBP) cascade algorithm.
//
// Copyright (C) 2013, Keith Mok <ek9852@gmail.com>
//
// As an open-source face detection engine: you can redistribute facelbp source codes
// and/or modify it under the terms of the Apache License, Version 2.0.
//
// You should have received a copy of the Apache License, Version 2.0 along with the software.
// If not, see < https://www.apache.org/licenses/LICENSE-2.0>.

//! Vector LBP code kernels.
//!
//! Each corner row is one 4-lane u32 vector. The difference of two adjacent
//! rows, minus itself shifted by one lane, gives a row of three block sums
//! (lane 3 is garbage and carries a zero weight). All arithmetic wraps, so the
//! sums are bit-identical to the scalar ones.

use crate::feat::Corners;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "sse2")]
pub unsafe fn lbp_code_sse2(corners: &Corners) -> u8 {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    let r0 = _mm_loadu_si128(corners[0].as_ptr() as *const __m128i);
    let r1 = _mm_loadu_si128(corners[1].as_ptr() as *const __m128i);
    let r2 = _mm_loadu_si128(corners[2].as_ptr() as *const __m128i);
    let r3 = _mm_loadu_si128(corners[3].as_ptr() as *const __m128i);

    let d0 = _mm_sub_epi32(r0, r1);
    let d1 = _mm_sub_epi32(r1, r2);
    let d2 = _mm_sub_epi32(r2, r3);

    let b0 = _mm_sub_epi32(d0, _mm_srli_si128::<4>(d0));
    let b1 = _mm_sub_epi32(d1, _mm_srli_si128::<4>(d1));
    let b2 = _mm_sub_epi32(d2, _mm_srli_si128::<4>(d2));

    // SSE2 only has signed compares: flip the sign bit and test center > value,
    // the complement of which is value >= center.
    let sign = _mm_set1_epi32(i32::MIN);
    let center = _mm_xor_si128(_mm_shuffle_epi32::<0x55>(b1), sign);

    let lt0 = _mm_cmpgt_epi32(center, _mm_xor_si128(b0, sign));
    let lt1 = _mm_cmpgt_epi32(center, _mm_xor_si128(b1, sign));
    let lt2 = _mm_cmpgt_epi32(center, _mm_xor_si128(b2, sign));

    let m0 = _mm_andnot_si128(lt0, _mm_setr_epi32(0x80, 0x40, 0x20, 0));
    let m1 = _mm_andnot_si128(lt1, _mm_setr_epi32(0x01, 0, 0x10, 0));
    let m2 = _mm_andnot_si128(lt2, _mm_setr_epi32(0x02, 0x04, 0x08, 0));

    let acc = _mm_add_epi32(m0, _mm_add_epi32(m1, m2));
    let acc = _mm_add_epi32(acc, _mm_shuffle_epi32::<0x4E>(acc));
    let acc = _mm_add_epi32(acc, _mm_shuffle_epi32::<0xB1>(acc));
    _mm_cvtsi128_si32(acc) as u8
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
pub unsafe fn lbp_code_neon(corners: &Corners) -> u8 {
    use std::arch::aarch64::*;

    const W0: [u32; 4] = [0x80, 0x40, 0x20, 0];
    const W1: [u32; 4] = [0x01, 0, 0x10, 0];
    const W2: [u32; 4] = [0x02, 0x04, 0x08, 0];

    let r0 = vld1q_u32(corners[0].as_ptr());
    let r1 = vld1q_u32(corners[1].as_ptr());
    let r2 = vld1q_u32(corners[2].as_ptr());
    let r3 = vld1q_u32(corners[3].as_ptr());

    let d0 = vsubq_u32(r0, r1);
    let d1 = vsubq_u32(r1, r2);
    let d2 = vsubq_u32(r2, r3);

    let zero = vdupq_n_u32(0);
    let b0 = vsubq_u32(d0, vextq_u32::<1>(d0, zero));
    let b1 = vsubq_u32(d1, vextq_u32::<1>(d1, zero));
    let b2 = vsubq_u32(d2, vextq_u32::<1>(d2, zero));

    let center = vdupq_laneq_u32::<1>(b1);

    let m0 = vandq_u32(vcgeq_u32(b0, center), vld1q_u32(W0.as_ptr()));
    let m1 = vandq_u32(vcgeq_u32(b1, center), vld1q_u32(W1.as_ptr()));
    let m2 = vandq_u32(vcgeq_u32(b2, center), vld1q_u32(W2.as_ptr()));

    vaddvq_u32(vaddq_u32(m0, vaddq_u32(m1, m2))) as u8
}

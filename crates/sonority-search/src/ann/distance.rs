use sonority_core::FEATURE_COUNT;

pub(crate) type Vector = [f32; FEATURE_COUNT];

pub(crate) fn dot(a: &Vector, b: &Vector) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn norm(a: &Vector) -> f32 {
    dot(a, a).sqrt()
}

/// Scale to unit length. Zero vectors are returned unchanged.
pub(crate) fn normalized(a: &Vector) -> Vector {
    let n = norm(a);
    if n > 0.0 {
        a.map(|x| x / n)
    } else {
        *a
    }
}

/// Angular distance `sqrt(2 - 2 cos(a, b))`, in `0.0..=2.0`.
///
/// If either vector has zero length the cosine is undefined and the
/// distance is `sqrt(2)`, as for orthogonal vectors. The same holds when
/// the cosine cannot be computed at all (non-finite components).
pub fn angular_distance(a: &[f32; FEATURE_COUNT], b: &[f32; FEATURE_COUNT]) -> f32 {
    let a = a.map(f64::from);
    let b = b.map(f64::from);
    let dot64 = |x: &[f64; FEATURE_COUNT], y: &[f64; FEATURE_COUNT]| -> f64 {
        x.iter().zip(y).map(|(p, q)| p * q).sum()
    };
    let pp = dot64(&a, &a);
    let qq = dot64(&b, &b);
    let pq = dot64(&a, &b);
    let ppqq = pp * qq;
    let squared = if ppqq > 0.0 {
        2.0 - 2.0 * pq / ppqq.sqrt()
    } else {
        2.0
    };
    if squared.is_nan() {
        return std::f32::consts::SQRT_2;
    }
    squared.max(0.0).sqrt() as f32
}

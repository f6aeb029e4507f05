use crate::pose::Point;

/// 2点の中点。どちらかが欠損ならNone
pub fn midpoint(a: Option<Point>, b: Option<Point>) -> Option<Point> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)),
        _ => None,
    }
}

pub fn distance(a: Point, b: Point) -> f32 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// 三角形 a-b-c の b における関節角（度）
///
/// cos(θ) = (ba · bc) / (|ba| |bc|)。ベクトルが退化していればNone。
pub fn joint_angle_deg(a: Option<Point>, b: Option<Point>, c: Option<Point>) -> Option<f32> {
    let (a, b, c) = (a?, b?, c?);
    let ba = (a.x - b.x, a.y - b.y);
    let bc = (c.x - b.x, c.y - b.y);
    let norm_ba = ba.0.hypot(ba.1);
    let norm_bc = bc.0.hypot(bc.1);
    let denom = norm_ba * norm_bc;
    if denom < 1e-6 {
        return None;
    }
    let cos_val = ((ba.0 * bc.0 + ba.1 * bc.1) / denom).clamp(-1.0, 1.0);
    Some(cos_val.acos().to_degrees())
}

/// ベクトル from→to の鉛直からの傾き（度）
///
/// 0 = 直立。atan2(|dx|, |dy|) なので前後の区別はしない。
pub fn vertical_angle_deg(from: Point, to: Point) -> Option<f32> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx.abs() + dy.abs() < 1e-6 {
        return None;
    }
    Some(dx.abs().atan2(dy.abs()).to_degrees())
}

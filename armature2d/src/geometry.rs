use crate::Point;
use std::f32::consts::{FRAC_PI_2, PI};

/// Outcome of a segment query against a bounding box.
///
/// `count` follows the runtime convention:
/// - `0`: no intersection,
/// - `1`: only the end point `B` lies inside, `point_a == point_b` is the entry point,
/// - `2`: only the start point `A` lies inside, `point_a == point_b` is the exit point,
/// - `>= 3`: the segment crosses the box, `point_a`/`point_b` are the nearest/farthest hits,
/// - negative: both end points are enclosed and no edge is crossed.
///
/// `normal_radians.x`/`.y` are the outward normal angles at `point_a`/`point_b`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SegmentIntersection {
    pub count: i32,
    pub point_a: Point,
    pub point_b: Point,
    pub normal_radians: Point,
}

impl SegmentIntersection {
    pub const MISS: Self = Self {
        count: 0,
        point_a: Point::ZERO,
        point_b: Point::ZERO,
        normal_radians: Point::ZERO,
    };

    pub fn is_hit(&self) -> bool {
        self.count > 0
    }

    pub fn is_enclosed(&self) -> bool {
        self.count < 0
    }
}

/// Hit-test geometry expressed in the owning slot's local space.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundingBox {
    /// Axis-aligned rectangle centred on the origin.
    Rectangle { width: f32, height: f32 },
    /// Axis-aligned ellipse centred on the origin.
    Ellipse { width: f32, height: f32 },
    /// Closed polygon, flat `[x0, y0, x1, y1, ..]`.
    Polygon { vertices: Vec<f32> },
}

impl BoundingBox {
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        match self {
            BoundingBox::Rectangle { width, height } => {
                let half_w = width * 0.5;
                let half_h = height * 0.5;
                x >= -half_w && x <= half_w && y >= -half_h && y <= half_h
            }
            BoundingBox::Ellipse { width, height } => {
                let half_w = width * 0.5;
                let half_h = height * 0.5;
                if x < -half_w || x > half_w || y < -half_h || y > half_h || half_h <= 0.0 {
                    return false;
                }
                let y = y * half_w / half_h;
                (x * x + y * y).sqrt() <= half_w
            }
            BoundingBox::Polygon { vertices } => polygon_contains_point(vertices, x, y),
        }
    }

    pub fn intersects_segment(&self, a: Point, b: Point) -> SegmentIntersection {
        match self {
            BoundingBox::Rectangle { width, height } => {
                let half_w = width * 0.5;
                let half_h = height * 0.5;
                rectangle_intersects_segment(a, b, -half_w, -half_h, half_w, half_h)
            }
            BoundingBox::Ellipse { width, height } => {
                ellipse_intersects_segment(a, b, width * 0.5, height * 0.5)
            }
            BoundingBox::Polygon { vertices } => polygon_intersects_segment(a, b, vertices),
        }
    }
}

const OUT_LEFT: u8 = 1;
const OUT_RIGHT: u8 = 2;
const OUT_TOP: u8 = 4;
const OUT_BOTTOM: u8 = 8;

fn out_code(x: f32, y: f32, x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> u8 {
    let mut code = 0;
    if x < x_min {
        code |= OUT_LEFT;
    } else if x > x_max {
        code |= OUT_RIGHT;
    }
    if y < y_min {
        code |= OUT_TOP;
    } else if y > y_max {
        code |= OUT_BOTTOM;
    }
    code
}

// Cohen-Sutherland clipping against the box, tracking which edge produced each hit.
fn rectangle_intersects_segment(
    a: Point,
    b: Point,
    x_min: f32,
    y_min: f32,
    x_max: f32,
    y_max: f32,
) -> SegmentIntersection {
    let inside_a = a.x > x_min && a.x < x_max && a.y > y_min && a.y < y_max;
    let inside_b = b.x > x_min && b.x < x_max && b.y > y_min && b.y < y_max;
    if inside_a && inside_b {
        return SegmentIntersection {
            count: -1,
            ..SegmentIntersection::MISS
        };
    }

    let (mut xa, mut ya, mut xb, mut yb) = (a.x, a.y, b.x, b.y);
    let mut code_a = out_code(xa, ya, x_min, y_min, x_max, y_max);
    let mut code_b = out_code(xb, yb, x_min, y_min, x_max, y_max);
    let mut normals = Point::ZERO;
    let mut count = 0;

    loop {
        if code_a | code_b == 0 {
            count = 2;
            break;
        }
        if code_a & code_b != 0 {
            break;
        }

        let code_out = if code_a != 0 { code_a } else { code_b };
        let (x, y, normal) = if code_out & OUT_TOP != 0 {
            (xa + (xb - xa) * (y_min - ya) / (yb - ya), y_min, -FRAC_PI_2)
        } else if code_out & OUT_BOTTOM != 0 {
            (xa + (xb - xa) * (y_max - ya) / (yb - ya), y_max, FRAC_PI_2)
        } else if code_out & OUT_RIGHT != 0 {
            (x_max, ya + (yb - ya) * (x_max - xa) / (xb - xa), 0.0)
        } else {
            (x_min, ya + (yb - ya) * (x_min - xa) / (xb - xa), PI)
        };

        if code_out == code_a {
            xa = x;
            ya = y;
            code_a = out_code(xa, ya, x_min, y_min, x_max, y_max);
            normals.x = normal;
        } else {
            xb = x;
            yb = y;
            code_b = out_code(xb, yb, x_min, y_min, x_max, y_max);
            normals.y = normal;
        }
    }

    if count == 0 {
        return SegmentIntersection::MISS;
    }

    if inside_a {
        normals.x = normals.y + PI;
        SegmentIntersection {
            count: 2,
            point_a: Point::new(xb, yb),
            point_b: Point::new(xb, yb),
            normal_radians: normals,
        }
    } else if inside_b {
        normals.y = normals.x + PI;
        SegmentIntersection {
            count: 1,
            point_a: Point::new(xa, ya),
            point_b: Point::new(xa, ya),
            normal_radians: normals,
        }
    } else {
        SegmentIntersection {
            count: 3,
            point_a: Point::new(xa, ya),
            point_b: Point::new(xb, yb),
            normal_radians: normals,
        }
    }
}

fn ellipse_intersects_segment(a: Point, b: Point, half_w: f32, half_h: f32) -> SegmentIntersection {
    if half_w <= 0.0 || half_h <= 0.0 {
        return SegmentIntersection::MISS;
    }

    // Squash y so the ellipse becomes a circle of radius `half_w`.
    let d = half_w / half_h;
    let dd = d * d;
    let xa = a.x;
    let ya = a.y * d;
    let xb = b.x;
    let yb = b.y * d;

    let dx = xb - xa;
    let dy = yb - ya;
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        return SegmentIntersection::MISS;
    }
    let xd = dx / length;
    let yd = dy / length;

    let projection = -xa * xd - ya * yd;
    let rr = half_w * half_w;
    let discriminant = rr - (xa * xa + ya * ya) + projection * projection;
    if discriminant < 0.0 {
        return SegmentIntersection::MISS;
    }

    let dt = discriminant.sqrt();
    let s_a = projection - dt;
    let s_b = projection + dt;
    let side = |s: f32| -> i32 {
        if s < 0.0 {
            -1
        } else if s <= length {
            0
        } else {
            1
        }
    };
    let side_a = side(s_a);
    let side_b = side(s_b);
    let side_ab = side_a * side_b;

    if side_ab < 0 {
        return SegmentIntersection {
            count: -1,
            ..SegmentIntersection::MISS
        };
    }
    if side_ab > 0 {
        return SegmentIntersection::MISS;
    }

    let hit = |s: f32| Point::new(xa + s * xd, (ya + s * yd) / d);
    let normal = |p: Point| (p.y / rr * dd).atan2(p.x / rr);

    if side_a == -1 {
        let p = hit(s_b);
        let n = normal(p);
        SegmentIntersection {
            count: 2,
            point_a: p,
            point_b: p,
            normal_radians: Point::new(n, n + PI),
        }
    } else if side_b == 1 {
        let p = hit(s_a);
        let n = normal(p);
        SegmentIntersection {
            count: 1,
            point_a: p,
            point_b: p,
            normal_radians: Point::new(n, n + PI),
        }
    } else {
        let pa = hit(s_a);
        let pb = hit(s_b);
        SegmentIntersection {
            count: 3,
            point_a: pa,
            point_b: pb,
            normal_radians: Point::new(normal(pa), normal(pb)),
        }
    }
}

fn polygon_contains_point(vertices: &[f32], x: f32, y: f32) -> bool {
    let len = vertices.len() - vertices.len() % 2;
    if len < 6 {
        return false;
    }

    let mut inside = false;
    let mut prev = len - 2;
    let mut i = 0;
    while i < len {
        let ya = vertices[prev + 1];
        let yb = vertices[i + 1];
        if (yb < y && ya >= y) || (ya < y && yb >= y) {
            let xa = vertices[prev];
            let xb = vertices[i];
            if (y - yb) * (xa - xb) / (ya - yb) + xb < x {
                inside = !inside;
            }
        }
        prev = i;
        i += 2;
    }
    inside
}

fn polygon_intersects_segment(a: Point, b: Point, vertices: &[f32]) -> SegmentIntersection {
    let len = vertices.len() - vertices.len() % 2;
    if len < 6 {
        return SegmentIntersection::MISS;
    }

    let (mut xa, mut ya) = (a.x, a.y);
    let (xb, yb) = (b.x, b.y);
    // Nudge degenerate axis-aligned cases so the line equations stay solvable.
    if xa == xb {
        xa = xb + 0.000_001;
    }
    if ya == yb {
        ya = yb + 0.000_001;
    }

    let dx_ab = xa - xb;
    let dy_ab = ya - yb;
    let ll_ab = xa * yb - ya * xb;

    let mut count = 0;
    let mut d_min = 0.0f32;
    let mut d_max = 0.0f32;
    let mut nearest = Point::ZERO;
    let mut farthest = Point::ZERO;
    let mut normals = Point::ZERO;

    let mut xc = vertices[len - 2];
    let mut yc = vertices[len - 1];
    let mut i = 0;
    while i < len {
        let xd = vertices[i];
        let yd = vertices[i + 1];
        if xc == xd {
            xc = xd + 0.0001;
        }
        if yc == yd {
            yc = yd + 0.0001;
        }

        let dx_cd = xc - xd;
        let dy_cd = yc - yd;
        let ll_cd = xc * yd - yc * xd;
        let ll = dx_ab * dy_cd - dy_ab * dx_cd;
        let x = (ll_ab * dx_cd - dx_ab * ll_cd) / ll;

        let within_x = ((x >= xc && x <= xd) || (x >= xd && x <= xc))
            && ((x >= xa && x <= xb) || (x >= xb && x <= xa));
        if within_x {
            let y = (ll_ab * dy_cd - dy_ab * ll_cd) / ll;
            let within_y = ((y >= yc && y <= yd) || (y >= yd && y <= yc))
                && ((y >= ya && y <= yb) || (y >= yb && y <= ya));
            if within_y {
                let distance = (x - xa).abs();
                let normal = (yd - yc).atan2(xd - xc) - FRAC_PI_2;
                if count == 0 {
                    d_min = distance;
                    d_max = distance;
                    nearest = Point::new(x, y);
                    farthest = nearest;
                    normals = Point::new(normal, normal);
                } else {
                    if distance < d_min {
                        d_min = distance;
                        nearest = Point::new(x, y);
                        normals.x = normal;
                    }
                    if distance > d_max {
                        d_max = distance;
                        farthest = Point::new(x, y);
                        normals.y = normal;
                    }
                }
                count += 1;
            }
        }

        xc = xd;
        yc = yd;
        i += 2;
    }

    match count {
        0 => {
            if polygon_contains_point(vertices, a.x, a.y) {
                SegmentIntersection {
                    count: -1,
                    ..SegmentIntersection::MISS
                }
            } else {
                SegmentIntersection::MISS
            }
        }
        1 => {
            normals.y = normals.x + PI;
            let inside_a = polygon_contains_point(vertices, a.x, a.y);
            SegmentIntersection {
                count: if inside_a { 2 } else { 1 },
                point_a: nearest,
                point_b: nearest,
                normal_radians: normals,
            }
        }
        n => SegmentIntersection {
            count: n + 1,
            point_a: nearest,
            point_b: farthest,
            normal_radians: normals,
        },
    }
}

//! Front-to-back BSP traversal and the `solidsegs` occlusion clip list
//! (§4.6). The solid-seg merge/insert algorithm is a direct port of the
//! teacher's `Software::add_solid_seg` (`renderer/software/renderer.rs`),
//! which itself already implements exactly the coalescing behaviour
//! §8's "BSP solid-clip coverage" test demands.

use super::context::Frame;
use crate::fixed::{Angle, Fixed};
use crate::map::{BOXBOTTOM, BOXLEFT, BOXRIGHT, BOXTOP, Level, Node, SubsectorId};
use crate::view::ViewFrustum;

/// Angle from the viewer to a world point. Vanilla Doom reconstructs
/// this from slope-to-angle tables; we use `atan2` directly since the
/// host has real trig and the spec's accuracy bar (round-trip within
/// one screen column, §8) is unaffected either way.
pub fn point_to_angle(view_x: Fixed, view_y: Fixed, x: Fixed, y: Fixed) -> Angle {
    let dx = (x - view_x).to_f64();
    let dy = (y - view_y).to_f64();
    Angle::from_degrees(dy.atan2(dx).to_degrees())
}

/// Projects a world angle, already relative to `viewangle` (zero means
/// dead ahead), to a screen column using `viewangletox`. Adding `ANG90`
/// before extracting the fine-angle index is vanilla's
/// `viewangletox[(angle+ANG90)>>ANGLETOFINESHIFT]` convention, which
/// `ViewFrustum::build` constructs the table to match.
pub fn angle_to_x(frustum: &ViewFrustum, angle: Angle) -> i32 {
    let offset = angle.add(Angle(crate::fixed::ANG90));
    let idx = offset.fine_index().min(frustum.viewangletox.len() - 1);
    frustum.viewangletox[idx]
}

/// Inserts `[first, last]` (inclusive screen columns) into the solid
/// clip list, merging with any overlapping or touching existing range.
pub fn add_solid_seg(frame: &mut Frame, first: i32, last: i32) {
    let segs = &mut frame.solidsegs;

    // first existing range that could overlap or touch the new one
    let mut start = 0;
    while segs[start].1 < first - 1 {
        start += 1;
    }

    if last < segs[start].0 - 1 {
        // disjoint from everything at and after `start`: stand-alone insert
        segs.insert(start, (first, last));
        return;
    }

    // last existing range the new one reaches into
    let mut end = start;
    while end + 1 < segs.len() && segs[end + 1].0 <= last + 1 {
        end += 1;
    }

    let new_first = first.min(segs[start].0);
    let new_last = last.max(segs[end].1);
    segs.splice(start..=end, std::iter::once((new_first, new_last)));
}

/// `false` only when a single existing solidseg entry covers the whole
/// `[sx1, sx2]` column range.
pub fn bbox_is_occluded(frame: &Frame, sx1: i32, sx2: i32) -> bool {
    for seg in &frame.solidsegs {
        if seg.0 <= sx1 && seg.1 >= sx2 {
            return true;
        }
    }
    false
}

/// Projects an axis-aligned bounding box to its screen-column range,
/// returning `None` if the box is entirely behind the viewer.
pub fn project_bbox(
    view_x: Fixed,
    view_y: Fixed,
    view_angle: Angle,
    frustum: &ViewFrustum,
    bbox: [Fixed; 4],
) -> Option<(i32, i32)> {
    let corners = [
        (bbox[BOXLEFT], bbox[BOXTOP]),
        (bbox[BOXRIGHT], bbox[BOXTOP]),
        (bbox[BOXLEFT], bbox[BOXBOTTOM]),
        (bbox[BOXRIGHT], bbox[BOXBOTTOM]),
    ];

    let mut min_x = i32::MAX;
    let mut max_x = i32::MIN;
    let mut any_visible = false;

    // half the field of view (90-degree FOV => 45 degrees either side),
    // in the same signed-angle domain as `relative` below
    let half_fov = crate::fixed::ANG45;

    for (x, y) in corners {
        let world_angle = point_to_angle(view_x, view_y, x, y);
        let relative = world_angle.sub(view_angle);
        // fold the unsigned BAM angle into a signed offset from dead ahead
        let signed = relative.0 as i32;
        if (signed.unsigned_abs()) > half_fov {
            continue;
        }
        any_visible = true;
        let col = angle_to_x(frustum, relative);
        min_x = min_x.min(col);
        max_x = max_x.max(col);
    }

    if !any_visible {
        return None;
    }
    Some((min_x.clamp(0, frustum.width - 1), max_x.clamp(0, frustum.width - 1)))
}

/// Recursive front-to-back BSP walk. Calls `visit` once for each
/// visible subsector, in strict front-to-back order (§5's ordering
/// guarantee, §8's "BspWalker determinism" property).
///
/// `frame` is a `RefCell` rather than a plain reference because `visit`
/// itself needs mutable access to the same frame (to emit drawsegs and
/// solid-seg spans as it goes, so later occlusion checks in this same
/// walk see them) while `walk_bsp` only ever needs a shared borrow for
/// `bbox_is_occluded`. The two borrows never overlap: each is taken and
/// dropped within a single call, never held across the other.
pub fn walk_bsp<F: FnMut(SubsectorId)>(
    level: &Level,
    view_x: Fixed,
    view_y: Fixed,
    view_angle: Angle,
    frustum: &ViewFrustum,
    frame: &std::cell::RefCell<Frame>,
    visit: &mut F,
) {
    if level.nodes.is_empty() {
        if !level.subsectors.is_empty() {
            visit(0);
        }
        return;
    }
    walk_node(level, view_x, view_y, view_angle, frustum, frame, level.bsp_root(), visit);
}

fn walk_node<F: FnMut(SubsectorId)>(
    level: &Level,
    view_x: Fixed,
    view_y: Fixed,
    view_angle: Angle,
    frustum: &ViewFrustum,
    frame: &std::cell::RefCell<Frame>,
    node_idx: u16,
    visit: &mut F,
) {
    let node: &Node = &level.nodes[node_idx as usize];
    let side = node.point_side(view_x, view_y) as usize;
    let other = 1 - side;

    descend(level, view_x, view_y, view_angle, frustum, frame, node.children[side], visit);

    let bbox = node.bbox[other];
    let visible = match project_bbox(view_x, view_y, view_angle, frustum, bbox) {
        Some((x1, x2)) => !bbox_is_occluded(&frame.borrow(), x1, x2),
        None => true,
    };
    if visible {
        descend(level, view_x, view_y, view_angle, frustum, frame, node.children[other], visit);
    }
}

fn descend<F: FnMut(SubsectorId)>(
    level: &Level,
    view_x: Fixed,
    view_y: Fixed,
    view_angle: Angle,
    frustum: &ViewFrustum,
    frame: &std::cell::RefCell<Frame>,
    child: u16,
    visit: &mut F,
) {
    if Node::child_is_subsector(child) {
        visit(Node::child_index(child));
    } else {
        walk_node(level, view_x, view_y, view_angle, frustum, frame, child, visit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(frame: &Frame) -> Vec<(i32, i32)> {
        frame.solidsegs.clone()
    }

    #[test]
    fn adjacent_ranges_collapse_into_one() {
        let mut frame = Frame::new(320, 200);
        add_solid_seg(&mut frame, 10, 20);
        add_solid_seg(&mut frame, 21, 30);
        let middle: Vec<_> = segs(&frame)
            .into_iter()
            .filter(|&(a, b)| a >= 0 && b < 320)
            .collect();
        assert_eq!(middle, vec![(10, 30)]);
    }

    #[test]
    fn disjoint_ranges_stay_separate() {
        let mut frame = Frame::new(320, 200);
        add_solid_seg(&mut frame, 10, 20);
        add_solid_seg(&mut frame, 50, 60);
        let middle: Vec<_> = segs(&frame)
            .into_iter()
            .filter(|&(a, b)| a >= 0 && b < 320)
            .collect();
        assert_eq!(middle, vec![(10, 20), (50, 60)]);
    }

    #[test]
    fn fully_covered_range_is_occluded() {
        let mut frame = Frame::new(320, 200);
        add_solid_seg(&mut frame, 0, 319);
        assert!(bbox_is_occluded(&frame, 10, 20));
    }

    /// Builds a two-subsector level split by a single vertical partition
    /// at x=0: subsector 0 is the left half (x<0), subsector 1 is the
    /// right half (x>0).
    fn two_subsector_level() -> Level {
        use crate::map::{Sector, Seg, Sidedef, Subsector, Vertex};

        let sector = Sector {
            floor_h: std::cell::Cell::new(Fixed::ZERO),
            ceil_h: std::cell::Cell::new(Fixed::from_int(128)),
            floor_flat: 0,
            ceil_flat: 0,
            light_level: std::cell::Cell::new(192),
            special: 0,
            tag: 0,
            lines: Vec::new(),
            things: Vec::new(),
            validcount: std::cell::Cell::new(0),
            floor_flat_name: [0; 8],
            ceil_flat_name: [0; 8],
        };

        // partition is the y-axis (dx=0, dy=1); by `Node::point_side`'s
        // convention, side 0 is x>0 (right half), side 1 is x<0 (left
        // half). Subsector 0 sits on the right, subsector 1 on the left.
        let node = Node {
            x: Fixed::ZERO,
            y: Fixed::ZERO,
            dx: Fixed::ZERO,
            dy: Fixed::from_int(1),
            bbox: [
                [Fixed::from_int(128), Fixed::from_int(-128), Fixed::ZERO, Fixed::from_int(128)],
                [Fixed::from_int(128), Fixed::from_int(-128), Fixed::from_int(-128), Fixed::ZERO],
            ],
            children: [crate::map::SUBSECTOR_BIT, crate::map::SUBSECTOR_BIT | 1],
        };

        Level {
            vertexes: vec![Vertex { x: Fixed::ZERO, y: Fixed::ZERO }],
            linedefs: Vec::new(),
            sidedefs: Vec::<Sidedef>::new(),
            sectors: vec![sector.clone(), sector],
            subsectors: vec![
                Subsector { sector: 0, first_seg: 0, seg_count: 0 },
                Subsector { sector: 1, first_seg: 0, seg_count: 0 },
            ],
            segs: Vec::<Seg>::new(),
            nodes: vec![node],
            things: Vec::new(),
        }
    }

    #[test]
    fn bsp_walk_visits_near_subsector_before_far_one_and_is_repeatable() {
        let level = two_subsector_level();
        let frustum_view = crate::view::ViewState {
            x: Fixed::from_int(-64),
            y: Fixed::ZERO,
            z: Fixed::ZERO,
            angle: Angle::ZERO,
            extralight: 0,
            fixedcolormap: None,
        };
        let frustum = crate::view::ViewFrustum::build(&frustum_view, 320, 200);

        let walk_once = || {
            let frame = std::cell::RefCell::new(Frame::new(320, 200));
            let mut order = Vec::new();
            let mut visit = |ss: SubsectorId| order.push(ss);
            walk_bsp(&level, frustum_view.x, frustum_view.y, frustum_view.angle, &frustum, &frame, &mut visit);
            order
        };

        let first = walk_once();
        let second = walk_once();
        assert_eq!(first, second, "repeated walks from the same viewpoint must visit in the same order");
        // viewer sits left of the partition (x=-64, side 1), so subsector
        // 1 (the left half, the viewer's own side) must come first.
        assert_eq!(first.first(), Some(&1), "front-to-back order must reach the viewer's own side first");
    }
}

//! Flies a free camera through a Doom level using the `firmdoom`
//! software renderer, displaying the indexed framebuffer through a
//! `minifb` window. No simulation tick, collision, or game state is
//! modelled here — the camera simply hovers at eye height above
//! whatever sector it's standing in, which is enough to exercise the
//! renderer end to end.

use clap::Parser;
use minifb::{Key, Window, WindowOptions};
use std::path::PathBuf;

use firmdoom::fixed::{Angle, Fixed, finecosine, finesine};
use firmdoom::flash::{FlashReader, SliceFlash};
use firmdoom::map::{self, Level};
use firmdoom::render::{Frame, render_frame};
use firmdoom::texture::{self, Rgb};
use firmdoom::view::{SCREENHEIGHT, SCREENWIDTH, ViewFrustum, ViewState};
use firmdoom::wad::LumpStore;

#[derive(Parser)]
#[command(about = "Flies a free camera through a Doom level using the firmdoom software renderer")]
struct Args {
    /// Path to an IWAD or PWAD file
    wad: PathBuf,
    /// Index into the WAD's level markers, in directory order
    #[arg(default_value_t = 0)]
    map_index: usize,
    /// Integer upscale factor for the display window
    #[arg(long, default_value_t = 3)]
    scale: usize,
}

const EYE_HEIGHT: Fixed = Fixed(41 << 16);
const MOVE_SPEED: Fixed = Fixed(8 << 16);
const TURN_SPEED_DEGREES: f64 = 3.0;

fn main() {
    env_logger::init();
    let args = Args::parse();

    let bytes = std::fs::read(&args.wad).unwrap_or_else(|e| panic!("reading {}: {e}", args.wad.display()));
    let mut store = LumpStore::from_bytes(bytes.clone()).expect("not a valid WAD (bad IWAD/PWAD magic)");
    store.build_index();
    let mut reader = FlashReader::new(SliceFlash::new(bytes));

    let markers = map::level_indices(&store);
    let marker = *markers
        .get(args.map_index)
        .unwrap_or_else(|| panic!("map index {} out of range ({} levels in this WAD)", args.map_index, markers.len()));

    let mut level = map::load_level(&store, &mut reader, marker).expect("failed to parse level");
    let textures = texture::load_textures(&store, &mut reader).expect("failed to load textures");
    level.resolve_textures(&textures);

    let player_start = level
        .things
        .iter()
        .find(|t| t.doom_type == 1)
        .expect("no player 1 start in this map");

    let mut view = ViewState {
        x: player_start.x,
        y: player_start.y,
        z: Fixed::ZERO,
        angle: player_start.angle,
        extralight: 0,
        fixedcolormap: None,
    };
    view.z = floor_height_at(&level, view.x, view.y) + EYE_HEIGHT;

    // viewangletox/xtoviewangle/yslope/distscale/scalelight depend only
    // on resolution and extralight, neither of which change frame to
    // frame here, so one frustum is built up front and reused.
    let frustum = ViewFrustum::build(&view, SCREENWIDTH, SCREENHEIGHT);
    let mut frame = Frame::new(SCREENWIDTH, SCREENHEIGHT);

    let win_width = SCREENWIDTH as usize * args.scale;
    let win_height = SCREENHEIGHT as usize * args.scale;
    let mut window = Window::new("firmdoom", win_width, win_height, WindowOptions::default())
        .expect("failed to open display window");
    window.set_target_fps(35);

    let mut display = vec![0u32; win_width * win_height];

    while window.is_open() && !window.is_key_down(Key::Escape) {
        handle_input(&window, &mut view, &level);
        render_frame(&level, &frustum, &view, &textures, &mut frame);
        upscale_indexed(
            &frame.framebuffer,
            SCREENWIDTH as usize,
            SCREENHEIGHT as usize,
            textures.palette.active(0),
            args.scale,
            &mut display,
        );
        window.update_with_buffer(&display, win_width, win_height).unwrap();
    }
}

fn floor_height_at(level: &Level, x: Fixed, y: Fixed) -> Fixed {
    let ss = level.locate_subsector(x, y);
    level.sector_of(ss).floor_h.get()
}

fn handle_input(window: &Window, view: &mut ViewState, level: &Level) {
    let cos = finecosine(view.angle.fine_index());
    let sin = finesine(view.angle.fine_index());

    let mut dx = Fixed::ZERO;
    let mut dy = Fixed::ZERO;
    if window.is_key_down(Key::W) || window.is_key_down(Key::Up) {
        dx += cos.mul(MOVE_SPEED);
        dy += sin.mul(MOVE_SPEED);
    }
    if window.is_key_down(Key::S) || window.is_key_down(Key::Down) {
        dx -= cos.mul(MOVE_SPEED);
        dy -= sin.mul(MOVE_SPEED);
    }
    if window.is_key_down(Key::A) {
        dx += sin.mul(MOVE_SPEED);
        dy -= cos.mul(MOVE_SPEED);
    }
    if window.is_key_down(Key::D) {
        dx -= sin.mul(MOVE_SPEED);
        dy += cos.mul(MOVE_SPEED);
    }
    if window.is_key_down(Key::Left) {
        view.angle = view.angle.add(Angle::from_degrees(TURN_SPEED_DEGREES));
    }
    if window.is_key_down(Key::Right) {
        view.angle = view.angle.sub(Angle::from_degrees(TURN_SPEED_DEGREES));
    }

    view.x += dx;
    view.y += dy;
    view.z = floor_height_at(level, view.x, view.y) + EYE_HEIGHT;
}

/// Palette-index framebuffer -> `0RGB` pixels, nearest-neighbour
/// repeated `scale` times per source pixel in both axes.
fn upscale_indexed(src: &[u8], src_w: usize, src_h: usize, palette: &[Rgb; 256], scale: usize, dst: &mut [u32]) {
    let dst_w = src_w * scale;
    for y in 0..src_h {
        for x in 0..src_w {
            let Rgb(r, g, b) = palette[src[y * src_w + x] as usize];
            let packed = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            for sy in 0..scale {
                let row = (y * scale + sy) * dst_w;
                for sx in 0..scale {
                    dst[row + x * scale + sx] = packed;
                }
            }
        }
    }
}

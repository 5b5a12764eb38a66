use eframe::egui::{Context, FontData, FontDefinitions, FontFamily};
use tracing::{info, warn};

/// System fonts with CJK coverage, tried in order.
const CJK_FONTS: &[&str] = &[
    "C:\\Windows\\Fonts\\msyh.ttc",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Medium.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
];

/// Adds the first available CJK font as a fallback so Chinese titles render.
pub fn install_cjk_font(ctx: &Context) {
    let Some((path, bytes)) = CJK_FONTS
        .iter()
        .find_map(|p| std::fs::read(p).ok().map(|bytes| (*p, bytes)))
    else {
        warn!("no CJK font found, Chinese text may not render");
        return;
    };

    let mut fonts = FontDefinitions::default();
    fonts.font_data.insert("cjk".to_owned(), FontData::from_owned(bytes));
    for family in [FontFamily::Proportional, FontFamily::Monospace] {
        fonts.families.entry(family).or_default().push("cjk".to_owned());
    }
    ctx.set_fonts(fonts);
    info!(path, "loaded CJK font");
}

//! 文档合成 - 业务能力层
//!
//! 把按顺序抓取到的页面图片合成为一个 PDF：
//!
//! ```text
//! CapturedPage[]
//!  ├─ 1. 暂存   每页写入临时工作区 page_0000.img ...（顺序来自显式位置，不依赖目录遍历）
//!  ├─ 2. 规范化 带透明通道的图片铺白底后按质量参数编码为 JPEG，其余原样保留
//!  ├─ 3. 拼接   每张图片一页，写到目标目录下的 .part 临时文件
//!  ├─ 4. 落盘   不覆盖地重命名为最终文件名
//!  └─ 5. 清理   无论成功失败，临时工作区整体删除
//! ```
//!
//! 图片解码是 CPU 密集操作，异步入口通过 `spawn_blocking` 执行。
//!
//! 所有工作区都建在 `<temp_dir>/.drive-pdf-capture/` 下并带标记文件，
//! 启动清理只删除带标记的工作区，不碰该目录以外的任何东西。

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::{debug, info, warn};

use crate::error::AssemblyError;
use crate::models::CapturedPage;

/// 本工具独占的临时目录
pub const OWNED_TEMP_DIR: &str = ".drive-pdf-capture";

/// 临时工作区目录名前缀
pub const WORKSPACE_PREFIX: &str = "doc-";

/// 工作区标记文件，清理时只认带标记的目录
const WORKSPACE_MARKER: &str = ".workspace";

/// 文档合成器
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    temp_root: PathBuf,
    /// 规范化时 JPEG 编码质量 (1-100)
    jpeg_quality: u8,
    /// 像素到页面尺寸的换算
    page_dpi: f32,
}

/// 合成结果
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub destination: PathBuf,
    pub pages_written: usize,
    /// 无法解码而被丢弃的页面位置
    pub dropped: Vec<usize>,
}

#[derive(Debug)]
struct StagedPage {
    position: usize,
    path: PathBuf,
}

#[derive(Debug)]
enum PageEncoding {
    /// 已经是 JPEG，直接以 DCTDecode 嵌入
    Jpeg { data: Vec<u8>, components: u8 },
    /// 8 位 RGB 原始像素，无损嵌入
    Rgb { data: Vec<u8> },
}

#[derive(Debug)]
struct PdfImage {
    width: u32,
    height: u32,
    encoding: PageEncoding,
}

impl DocumentAssembler {
    pub fn new(temp_dir: &Path, jpeg_quality: u8, page_dpi: f32) -> Self {
        Self {
            temp_root: temp_dir.join(OWNED_TEMP_DIR),
            jpeg_quality: jpeg_quality.clamp(1, 100),
            page_dpi: if page_dpi > 0.0 { page_dpi } else { 96.0 },
        }
    }

    /// 使用独立子目录作为临时区域，避免不同来源的页面编号互相冲突
    pub fn scoped(&self, scope: &str) -> Self {
        Self {
            temp_root: self.temp_root.join(scope),
            ..self.clone()
        }
    }

    /// 异步入口：在阻塞线程池中合成
    pub async fn assemble(
        &self,
        pages: Vec<CapturedPage>,
        destination: &Path,
    ) -> Result<AssemblyReport, AssemblyError> {
        let assembler = self.clone();
        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || assembler.assemble_blocking(&pages, &destination))
            .await
            .map_err(|e| AssemblyError::TaskAborted(e.to_string()))?
    }

    /// 同步合成
    pub fn assemble_blocking(
        &self,
        pages: &[CapturedPage],
        destination: &Path,
    ) -> Result<AssemblyReport, AssemblyError> {
        if pages.is_empty() {
            return Err(AssemblyError::NoContent);
        }

        fs::create_dir_all(&self.temp_root).map_err(|source| AssemblyError::Workspace {
            path: self.temp_root.clone(),
            source,
        })?;
        let workspace = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&self.temp_root)
            .map_err(|source| AssemblyError::Workspace {
                path: self.temp_root.clone(),
                source,
            })?;
        debug!("临时工作区: {}", workspace.path().display());

        let marker = workspace.path().join(WORKSPACE_MARKER);
        let result = fs::write(&marker, b"")
            .map_err(|source| AssemblyError::Workspace { path: marker, source })
            .and_then(|()| self.assemble_in(workspace.path(), pages, destination));

        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            warn!("清理临时工作区失败 {}: {}", workspace_path.display(), e);
        }

        result
    }

    fn assemble_in(
        &self,
        workdir: &Path,
        pages: &[CapturedPage],
        destination: &Path,
    ) -> Result<AssemblyReport, AssemblyError> {
        let mut ordered: Vec<&CapturedPage> = pages.iter().collect();
        ordered.sort_by_key(|p| p.order);

        info!("📑 正在将 {} 张图片合成为 PDF...", ordered.len());
        let staged = stage_pages(workdir, &ordered)?;

        let mut images = Vec::with_capacity(staged.len());
        let mut dropped = Vec::new();
        for page in &staged {
            match self.normalize(workdir, page) {
                Ok(image) => images.push(image),
                Err(e) => {
                    warn!("⚠️ {}，该页已丢弃", e);
                    dropped.push(page.position);
                }
            }
        }

        if images.is_empty() {
            return Err(AssemblyError::NoContent);
        }

        let pages_written = images.len();
        self.write_pdf(images, destination)?;
        info!("✅ PDF 已生成: {}", destination.display());

        Ok(AssemblyReport {
            destination: destination.to_path_buf(),
            pages_written,
            dropped,
        })
    }

    /// 解码并规范化一张暂存图片
    fn normalize(&self, workdir: &Path, page: &StagedPage) -> Result<PdfImage, AssemblyError> {
        let encode_err = |detail: String| AssemblyError::Encode {
            position: page.position,
            detail,
        };

        let bytes = fs::read(&page.path).map_err(|e| encode_err(e.to_string()))?;
        let format = image::guess_format(&bytes).ok();
        let decoded = image::load_from_memory(&bytes).map_err(|e| encode_err(e.to_string()))?;
        let (width, height) = decoded.dimensions();
        let color = decoded.color();

        let passthrough = match format {
            Some(ImageFormat::Jpeg) => jpeg_passthrough(&bytes, color),
            _ => None,
        };
        let reencode = color.has_alpha()
            || is_palette(format, &bytes)
            || (format == Some(ImageFormat::Jpeg) && passthrough.is_none());

        let encoding = if reencode {
            let flattened = flatten_on_white(&decoded);
            let jpeg = encode_jpeg(&flattened, self.jpeg_quality).map_err(encode_err)?;
            let normalized_path = workdir.join(format!("page_{:04}.jpg", page.position));
            fs::write(&normalized_path, &jpeg).map_err(|e| encode_err(e.to_string()))?;
            debug!("第 {} 页 ({:?}) 已铺白底并重新编码", page.position + 1, color);
            PageEncoding::Jpeg {
                data: jpeg,
                components: 3,
            }
        } else if let Some(components) = passthrough {
            PageEncoding::Jpeg {
                data: bytes,
                components,
            }
        } else {
            PageEncoding::Rgb {
                data: decoded.to_rgb8().into_raw(),
            }
        };

        Ok(PdfImage {
            width,
            height,
            encoding,
        })
    }

    /// 写入 .part 临时文件后再不覆盖地落盘，失败时目标文件名上不会留下任何文件
    fn write_pdf(&self, images: Vec<PdfImage>, destination: &Path) -> Result<(), AssemblyError> {
        let write_err = |source: std::io::Error| AssemblyError::WriteFailed {
            path: destination.to_path_buf(),
            source,
        };

        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(write_err)?;

        let mut document = build_pdf(images, self.page_dpi)?;

        let mut part = tempfile::Builder::new()
            .prefix(".")
            .suffix(".pdf.part")
            .tempfile_in(parent)
            .map_err(write_err)?;
        document
            .save_to(&mut part)
            .map_err(|e| write_err(std::io::Error::other(e.to_string())))?;
        part.as_file().sync_all().map_err(write_err)?;
        part.persist_noclobber(destination)
            .map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

/// 按最终位置写入暂存文件，返回显式的 (位置, 路径) 列表
fn stage_pages(workdir: &Path, pages: &[&CapturedPage]) -> Result<Vec<StagedPage>, AssemblyError> {
    pages
        .iter()
        .enumerate()
        .map(|(position, page)| {
            let path = workdir.join(format!("page_{:04}.img", position));
            fs::write(&path, &page.bytes).map_err(|source| AssemblyError::Workspace {
                path: path.clone(),
                source,
            })?;
            Ok(StagedPage { position, path })
        })
        .collect()
}

/// 调色板图片（PNG 颜色类型 3，或 GIF）
fn is_palette(format: Option<ImageFormat>, bytes: &[u8]) -> bool {
    match format {
        Some(ImageFormat::Png) => bytes.get(12..16) == Some(b"IHDR".as_slice()) && bytes.get(25) == Some(&3),
        Some(ImageFormat::Gif) => true,
        _ => false,
    }
}

/// 从 SOF 段读取 JPEG 的颜色分量数
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if bytes.get(..2) != Some([0xFF, 0xD8].as_slice()) {
        return None;
    }
    let mut i = 2;
    while i + 1 < bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        i += 2;
        match marker {
            // 填充字节
            0xFF => i -= 1,
            0x01 | 0xD0..=0xD7 => {}
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => return bytes.get(i + 7).copied(),
            // 扫描数据开始前仍未遇到 SOF
            0xD9 | 0xDA => return None,
            _ => {
                let len = usize::from(u16::from_be_bytes([*bytes.get(i)?, *bytes.get(i + 1)?]));
                i += len;
            }
        }
    }
    None
}

/// 可以原样嵌入的 JPEG 返回其分量数（灰度 1 或 RGB 3），CMYK 等返回 None
fn jpeg_passthrough(bytes: &[u8], color: ColorType) -> Option<u8> {
    match (jpeg_components(bytes)?, color) {
        (1, ColorType::L8) => Some(1),
        (3, ColorType::Rgb8) => Some(3),
        _ => None,
    }
}

/// 合成到白色不透明背景上
fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        *dst = Rgb([blend(r), blend(g), blend(b)]);
    }
    out
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, String> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    image.write_with_encoder(encoder).map_err(|e| e.to_string())?;
    Ok(buf.into_inner())
}

/// 每张图片占一页，页面尺寸按 dpi 从像素换算
fn build_pdf(images: Vec<PdfImage>, dpi: f32) -> Result<Document, AssemblyError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(images.len());

    for image in images {
        let width_pt = points(image.width, dpi);
        let height_pt = points(image.height, dpi);

        let image_id = doc.add_object(image_stream(image));
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(width_pt),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(height_pt),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width_pt),
                Object::Integer(height_pt),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    // 只压缩未指定 Filter 的流（内容流和原始像素），JPEG 保持原样
    doc.compress();
    Ok(doc)
}

fn points(pixels: u32, dpi: f32) -> i64 {
    ((pixels as f32) * 72.0 / dpi).round().max(1.0) as i64
}

fn image_stream(image: PdfImage) -> Stream {
    let color_space = |components: u8| if components == 1 { "DeviceGray" } else { "DeviceRGB" };
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "BitsPerComponent" => 8i64,
    };
    match image.encoding {
        PageEncoding::Jpeg { data, components } => {
            dict.set("ColorSpace", color_space(components));
            dict.set("Filter", "DCTDecode");
            Stream::new(dict, data)
        }
        PageEncoding::Rgb { data } => {
            dict.set("ColorSpace", "DeviceRGB");
            Stream::new(dict, data)
        }
    }
}

/// 删除上次中断运行遗留的临时工作区，返回删除数量
///
/// 只处理 `<temp_dir>/.drive-pdf-capture/` 内带标记文件的 `doc-*` 目录
pub fn sweep_stale_workspaces(temp_dir: &Path) -> usize {
    fn is_workspace(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(WORKSPACE_PREFIX))
            && path.join(WORKSPACE_MARKER).is_file()
    }

    fn sweep_dir(dir: &Path, depth: usize) -> usize {
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            if is_workspace(&path) {
                match fs::remove_dir_all(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("清理遗留临时目录失败 {}: {}", path.display(), e),
                }
            } else if depth == 0 {
                removed += sweep_dir(&path, depth + 1);
            }
        }
        removed
    }

    let owned = temp_dir.join(OWNED_TEMP_DIR);
    let removed = sweep_dir(&owned, 0);
    if removed > 0 {
        info!("🧹 已清理 {} 个遗留临时工作区", removed);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaptureStrategy;
    use image::{Luma, Rgba, RgbaImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn page(order: usize, bytes: Vec<u8>) -> CapturedPage {
        CapturedPage {
            order,
            bytes,
            strategy: CaptureStrategy::DirectFetch,
        }
    }

    fn rgba_png(w: u32, h: u32) -> Vec<u8> {
        encode(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 128]))),
            ImageFormat::Png,
        )
    }

    fn rgb_png(w: u32, h: u32) -> Vec<u8> {
        encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([0, 128, 255]))),
            ImageFormat::Png,
        )
    }

    fn gray_jpeg(w: u32, h: u32) -> Vec<u8> {
        encode(
            DynamicImage::ImageLuma8(image::GrayImage::from_pixel(w, h, Luma([90]))),
            ImageFormat::Jpeg,
        )
    }

    fn is_empty_dir(path: &Path) -> bool {
        fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
    }

    fn page_count(path: &Path) -> usize {
        Document::load(path).unwrap().get_pages().len()
    }

    /// 按页序取每页 MediaBox 的宽度
    fn page_widths(path: &Path) -> Vec<i64> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|id| {
                let media_box = doc.get_dictionary(*id).unwrap().get(b"MediaBox").unwrap();
                media_box.as_array().unwrap()[2].as_i64().unwrap()
            })
            .collect()
    }

    #[test]
    fn assembles_mixed_images_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let assembler = DocumentAssembler::new(temp.path(), 90, 72.0);
        let dest = out.path().join("doc.pdf");

        let pages = vec![page(0, rgb_png(20, 30)), page(1, rgba_png(10, 10)), page(2, gray_jpeg(16, 16))];
        let report = assembler.assemble_blocking(&pages, &dest).unwrap();

        assert_eq!(report.pages_written, 3);
        assert!(report.dropped.is_empty());
        assert_eq!(page_widths(&dest), vec![20, 10, 16]);
        assert!(is_empty_dir(&temp.path().join(OWNED_TEMP_DIR)));
    }

    #[test]
    fn empty_input_is_no_content() {
        let temp = tempfile::tempdir().unwrap();
        let assembler = DocumentAssembler::new(temp.path(), 90, 96.0);
        let err = assembler
            .assemble_blocking(&[], &temp.path().join("x.pdf"))
            .unwrap_err();
        assert!(matches!(err, AssemblyError::NoContent));
        assert!(!temp.path().join("x.pdf").exists());
    }

    #[test]
    fn undecodable_page_is_dropped_and_rest_proceed() {
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let assembler = DocumentAssembler::new(temp.path(), 90, 96.0);
        let dest = out.path().join("doc.pdf");

        let pages = vec![page(0, rgb_png(8, 8)), page(1, b"not an image".to_vec()), page(2, rgb_png(8, 8))];
        let report = assembler.assemble_blocking(&pages, &dest).unwrap();

        assert_eq!(report.pages_written, 2);
        assert_eq!(report.dropped, vec![1]);
        assert_eq!(page_count(&dest), 2);
        assert!(is_empty_dir(&temp.path().join(OWNED_TEMP_DIR)));
    }

    #[test]
    fn all_pages_undecodable_leaves_nothing_behind() {
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let assembler = DocumentAssembler::new(temp.path(), 90, 96.0);
        let dest = out.path().join("doc.pdf");

        let err = assembler
            .assemble_blocking(&[page(0, b"junk".to_vec())], &dest)
            .unwrap_err();
        assert!(matches!(err, AssemblyError::NoContent));
        assert!(!dest.exists());
        assert!(is_empty_dir(out.path()));
        assert!(is_empty_dir(&temp.path().join(OWNED_TEMP_DIR)));
    }

    #[test]
    fn unwritable_destination_fails_and_cleans_up() {
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        // 父路径是一个普通文件，无法创建目录
        let blocker = out.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let dest = blocker.join("doc.pdf");

        let assembler = DocumentAssembler::new(temp.path(), 90, 96.0);
        let err = assembler
            .assemble_blocking(&[page(0, rgb_png(4, 4))], &dest)
            .unwrap_err();
        assert!(matches!(err, AssemblyError::WriteFailed { .. }));
        assert!(!dest.exists());
        assert!(is_empty_dir(&temp.path().join(OWNED_TEMP_DIR)));
    }

    #[test]
    fn existing_destination_is_never_overwritten() {
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("doc.pdf");
        fs::write(&dest, b"original").unwrap();

        let assembler = DocumentAssembler::new(temp.path(), 90, 96.0);
        let err = assembler
            .assemble_blocking(&[page(0, rgb_png(4, 4))], &dest)
            .unwrap_err();
        assert!(matches!(err, AssemblyError::WriteFailed { .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"original");
        // 只剩原文件，没有遗留 .part
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[test]
    fn transparency_is_flattened_on_white() {
        let transparent = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let flattened = flatten_on_white(&transparent);
        assert_eq!(flattened.get_pixel(0, 0), &Rgb([255, 255, 255]));

        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255])));
        assert_eq!(flatten_on_white(&opaque).get_pixel(1, 1), &Rgb([10, 20, 30]));
    }

    #[tokio::test]
    async fn async_entry_runs_on_blocking_pool() {
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let assembler = DocumentAssembler::new(temp.path(), 80, 96.0).scoped("standalone");
        let dest = out.path().join("a.pdf");

        let report = assembler
            .assemble(vec![page(0, rgb_png(5, 5))], &dest)
            .await
            .unwrap();
        assert_eq!(report.pages_written, 1);
        assert!(is_empty_dir(&temp.path().join(OWNED_TEMP_DIR).join("standalone")));
    }

    #[test]
    fn pages_are_placed_by_capture_order_not_input_order() {
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let assembler = DocumentAssembler::new(temp.path(), 90, 72.0);
        let dest = out.path().join("doc.pdf");

        let pages = vec![page(2, rgb_png(30, 10)), page(0, rgb_png(10, 10)), page(1, rgb_png(20, 10))];
        assembler.assemble_blocking(&pages, &dest).unwrap();

        assert_eq!(page_widths(&dest), vec![10, 20, 30]);
    }

    /// 最小的 8 位调色板 PNG：一行两个像素
    fn palette_png() -> Vec<u8> {
        fn crc32(data: &[u8]) -> u32 {
            let mut crc = 0xFFFF_FFFFu32;
            for &byte in data {
                crc ^= u32::from(byte);
                for _ in 0..8 {
                    crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
                }
            }
            !crc
        }
        fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            let mut body = kind.to_vec();
            body.extend_from_slice(data);
            out.extend_from_slice(&body);
            out.extend_from_slice(&crc32(&body).to_be_bytes());
        }

        // 过滤字节 0 + 两个索引
        let raw = [0u8, 0, 1];
        let (mut a, mut b) = (1u32, 0u32);
        for &byte in &raw {
            a = (a + u32::from(byte)) % 65521;
            b = (b + a) % 65521;
        }
        let mut idat = vec![0x78, 0x01, 0x01, raw.len() as u8, 0x00, !(raw.len() as u8), 0xFF];
        idat.extend_from_slice(&raw);
        idat.extend_from_slice(&((b << 16) | a).to_be_bytes());

        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 3, 0, 0, 0]);
        chunk(&mut png, b"IHDR", &ihdr);
        chunk(&mut png, b"PLTE", &[255, 0, 0, 0, 0, 255]);
        chunk(&mut png, b"IDAT", &idat);
        chunk(&mut png, b"IEND", &[]);
        png
    }

    fn staged(dir: &Path, bytes: &[u8]) -> StagedPage {
        let path = dir.join("page_0000.img");
        fs::write(&path, bytes).unwrap();
        StagedPage { position: 0, path }
    }

    #[test]
    fn palette_png_is_reencoded_at_configured_quality() {
        let work = tempfile::tempdir().unwrap();
        let bytes = palette_png();
        assert!(is_palette(Some(ImageFormat::Png), &bytes));
        assert!(!is_palette(Some(ImageFormat::Png), &rgb_png(2, 2)));

        let assembler = DocumentAssembler::new(work.path(), 50, 96.0);
        let image = assembler.normalize(work.path(), &staged(work.path(), &bytes)).unwrap();
        assert_eq!((image.width, image.height), (2, 1));
        match image.encoding {
            PageEncoding::Jpeg { data, components } => {
                assert_eq!(components, 3);
                assert_eq!(&data[..2], &[0xFF, 0xD8]);
            }
            PageEncoding::Rgb { .. } => panic!("palette image should be re-encoded as JPEG"),
        }
    }

    #[test]
    fn jpeg_component_count_comes_from_frame_header() {
        assert_eq!(jpeg_components(&gray_jpeg(4, 4)), Some(1));
        let rgb_jpeg = encode(DynamicImage::ImageRgb8(RgbImage::new(4, 4)), ImageFormat::Jpeg);
        assert_eq!(jpeg_components(&rgb_jpeg), Some(3));
        assert_eq!(jpeg_passthrough(&rgb_jpeg, ColorType::Rgb8), Some(3));

        // SOI, APP14 (Adobe), SOF0 with four components
        let cmyk_header = [
            0xFF, 0xD8, 0xFF, 0xEE, 0x00, 0x04, 0x00, 0x00, 0xFF, 0xC0, 0x00, 0x14, 0x08, 0x00, 0x01,
            0x00, 0x01, 0x04,
        ];
        assert_eq!(jpeg_components(&cmyk_header), Some(4));
        // 解码器把 CMYK 转成了 RGB，但原始字节不能按 RGB 嵌入
        assert_eq!(jpeg_passthrough(&cmyk_header, ColorType::Rgb8), None);
        assert_eq!(jpeg_components(b"not a jpeg"), None);
    }

    #[test]
    fn rgb_jpeg_is_embedded_unchanged() {
        let work = tempfile::tempdir().unwrap();
        let bytes = encode(DynamicImage::ImageRgb8(RgbImage::new(6, 4)), ImageFormat::Jpeg);
        let assembler = DocumentAssembler::new(work.path(), 50, 96.0);
        let image = assembler.normalize(work.path(), &staged(work.path(), &bytes)).unwrap();
        match image.encoding {
            PageEncoding::Jpeg { data, components } => {
                assert_eq!(components, 3);
                assert_eq!(data, bytes);
            }
            PageEncoding::Rgb { .. } => panic!("jpeg should pass through"),
        }
    }

    #[test]
    fn sweep_removes_only_marked_workspaces_in_owned_dir() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        let owned = root.join(OWNED_TEMP_DIR);

        // 本工具遗留的工作区
        for stale in [owned.join("doc-stale1"), owned.join("Reports/doc-stale2")] {
            fs::create_dir_all(stale.join("nested")).unwrap();
            fs::write(stale.join(WORKSPACE_MARKER), b"").unwrap();
        }
        // 用户自己的目录
        fs::create_dir_all(root.join("downloads/doc-specs")).unwrap();
        fs::write(root.join("downloads/doc-specs/old.pdf"), b"%PDF").unwrap();
        fs::create_dir_all(root.join("doc-notes")).unwrap();
        fs::write(root.join("doc-notes/notes.txt"), b"x").unwrap();
        fs::create_dir_all(root.join("empty-project")).unwrap();
        // 文件夹标题恰好以 doc- 开头的分区目录，没有标记
        fs::create_dir_all(owned.join("doc-specs")).unwrap();

        assert_eq!(sweep_stale_workspaces(root), 2);
        assert!(!owned.join("doc-stale1").exists());
        assert!(!owned.join("Reports/doc-stale2").exists());
        assert!(root.join("downloads/doc-specs/old.pdf").exists());
        assert!(root.join("doc-notes/notes.txt").exists());
        assert!(root.join("empty-project").is_dir());
        assert!(owned.join("doc-specs").is_dir());
    }

    #[test]
    fn sweep_without_owned_dir_is_a_no_op() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("doc-stale")).unwrap();
        fs::write(temp.path().join("doc-stale").join(WORKSPACE_MARKER), b"").unwrap();

        assert_eq!(sweep_stale_workspaces(temp.path()), 0);
        assert!(temp.path().join("doc-stale").exists());
    }
}

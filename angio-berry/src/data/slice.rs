//! 水平 (z 方向) 切片视图, 以及用于排查问题的 PNG 持久化存储.

use crate::consts::gray::*;
use crate::{AngioResult, Idx2d, Label};
use ndarray::{ArrayView2, Ix2};
use std::ops::Index;
use std::path::Path;

/// 不可变、借用的二维水平掩码切片.
pub struct MaskSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::BinaryMask`].
    data: ArrayView2<'a, u8>,
}

/// 不可变、借用的二维水平岛屿标签切片.
pub struct LabelSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::LabeledVolume`].
    data: ArrayView2<'a, Label>,
}

macro_rules! impl_slice_common {
    ($($slice: ident => $pix: ty),+) => {
        $(
            impl<'a> $slice<'a> {
                #[inline]
                pub(crate) fn new(data: ArrayView2<'a, $pix>) -> Self {
                    Self { data }
                }

                /// 获取切片的 (高, 宽).
                #[inline]
                pub fn shape(&self) -> Idx2d {
                    self.data.dim()
                }

                /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
                #[inline]
                pub fn get(&self, pos: Idx2d) -> Option<&$pix> {
                    self.data.get(pos)
                }

                /// 获取按行优先迭代 ((高, 宽), 像素) 的迭代器.
                #[inline]
                pub fn indexed_iter(&self) -> ndarray::iter::IndexedIter<'_, $pix, Ix2> {
                    self.data.indexed_iter()
                }
            }

            impl Index<Idx2d> for $slice<'_> {
                type Output = $pix;

                #[inline]
                fn index(&self, index: Idx2d) -> &Self::Output {
                    &self.data[index]
                }
            }
        )+
    };
}

impl_slice_common!(MaskSlice => u8, LabelSlice => Label);

impl MaskSlice<'_> {
    /// 切片中前景像素个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }
}

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 掩码与标签中的像素值都很小, 直接保存时肉眼几乎无法区分,
/// 因此在保存时会映射到较易区分的灰度.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径. 图片格式由扩展名决定.
    fn save<P: AsRef<Path>>(&self, path: P) -> AngioResult<()>;
}

/// 标号 -> 灰度. 背景为黑色, 岛屿在 `[DARK_GRAY, WHITE]` 之间循环取色.
#[inline]
fn pretty_label(label: Label) -> u8 {
    if label == crate::consts::BACKGROUND_LABEL {
        return BLACK;
    }
    const STEPS: Label = 8;
    let span = (WHITE - DARK_GRAY) as Label;
    DARK_GRAY + (span - ((label - 1) % STEPS) * (span / STEPS)) as u8
}

macro_rules! impl_vis {
    ($($slice: ty => $pretty: expr),+) => {
        $(
            impl ImgWriteVis for $slice {
                fn save<P: AsRef<Path>>(&self, path: P) -> AngioResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([$pretty(pix)]));
                    }
                    buf.save(path)?;
                    Ok(())
                }
            }
        )+
    };
}

impl_vis!(
    MaskSlice<'_> => |p: u8| if is_foreground(p) { WHITE } else { BLACK },
    LabelSlice<'_> => pretty_label
);

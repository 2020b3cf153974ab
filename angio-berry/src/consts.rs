//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 二值掩码中, 背景的体素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 二值掩码中, 前景 (血管) 的体素值.
    pub const MASK_FOREGROUND: u8 = 1;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道暗灰色.
    pub const DARK_GRAY: u8 = 0b_0100_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 体素是否是前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        !is_background(p)
    }

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, MASK_BACKGROUND)
    }
}

/// 标签体中背景的标号.
pub const BACKGROUND_LABEL: crate::Label = 0;

/// 默认阈值下限. 血管增强滤波输出通常归一化到 `[0, 1]`.
pub const DEFAULT_THRESHOLD_MIN: f32 = 0.8;

/// 默认阈值上限.
pub const DEFAULT_THRESHOLD_MAX: f32 = 1.0;

/// 默认的导出分段名称, 也是导出文件的主文件名.
pub const DEFAULT_SEGMENT_NAME: &str = "VesselSegmentation";

/// 体素/像素类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElemType {
    /// `MASK_BACKGROUND`, 代表背景.
    Background,

    /// `MASK_FOREGROUND`, 代表前景.
    Foreground,
}

impl ElemType {
    /// 是否为前景.
    #[inline]
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Foreground)
    }

    /// 是否为背景.
    #[inline]
    pub fn is_background(&self) -> bool {
        !self.is_foreground()
    }

    /// 对应的二值掩码体素值.
    #[inline]
    pub const fn gray(self) -> u8 {
        match self {
            Self::Background => gray::MASK_BACKGROUND,
            Self::Foreground => gray::MASK_FOREGROUND,
        }
    }
}

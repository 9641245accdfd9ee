// src/utils/device_type.rs

use crate::models::DeviceType;

pub struct DeviceTypeDetector;

impl DeviceTypeDetector {
    /// 从 User-Agent 一类的环境串推断设备类型，无副作用
    ///
    /// 平板要先于手机判断：iPad 和 Android 平板的 UA 往往也带 "Mobile"。
    pub fn detect(browser_info: &str) -> DeviceType {
        let ua = browser_info.to_lowercase();
        if ua.is_empty() {
            return DeviceType::Unknown;
        }

        let is_android = ua.contains("android");

        if ua.contains("ipad")
            || ua.contains("tablet")
            || ua.contains("kindle")
            || ua.contains("silk")
            || (is_android && !ua.contains("mobile"))
        {
            return DeviceType::Tablet;
        }

        if ua.contains("iphone")
            || ua.contains("ipod")
            || ua.contains("mobi")
            || ua.contains("blackberry")
            || ua.contains("opera mini")
            || ua.contains("windows phone")
            || is_android
        {
            return DeviceType::Mobile;
        }

        if ua.contains("windows")
            || ua.contains("macintosh")
            || ua.contains("x11")
            || ua.contains("linux")
            || ua.contains("cros")
        {
            return DeviceType::Desktop;
        }

        DeviceType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_mobile() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
        assert_eq!(DeviceTypeDetector::detect(ua), DeviceType::Mobile);

        let ua = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Mobile Safari/537.36";
        assert_eq!(DeviceTypeDetector::detect(ua), DeviceType::Mobile);
    }

    #[test]
    fn test_detect_tablet() {
        let ua = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
        assert_eq!(DeviceTypeDetector::detect(ua), DeviceType::Tablet);

        // Android 平板不带 "Mobile"
        let ua = "Mozilla/5.0 (Linux; Android 13; SM-X710) AppleWebKit/537.36 Safari/537.36";
        assert_eq!(DeviceTypeDetector::detect(ua), DeviceType::Tablet);
    }

    #[test]
    fn test_detect_desktop() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0";
        assert_eq!(DeviceTypeDetector::detect(ua), DeviceType::Desktop);

        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 Safari/605.1.15";
        assert_eq!(DeviceTypeDetector::detect(ua), DeviceType::Desktop);

        let ua = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/121.0";
        assert_eq!(DeviceTypeDetector::detect(ua), DeviceType::Desktop);
    }

    #[test]
    fn test_detect_ambiguous_is_unknown() {
        assert_eq!(DeviceTypeDetector::detect(""), DeviceType::Unknown);
        assert_eq!(DeviceTypeDetector::detect("curl/8.4.0"), DeviceType::Unknown);
    }
}

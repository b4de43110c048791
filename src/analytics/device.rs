//! Coarse device classification from user-agent strings

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
    Bot,
    Other,
}

impl DeviceClass {
    /// Classes reported even when nobody used them
    pub const ALWAYS_REPORTED: [DeviceClass; 3] =
        [DeviceClass::Desktop, DeviceClass::Mobile, DeviceClass::Tablet];

    pub fn name(self) -> &'static str {
        match self {
            Self::Desktop => "Desktop",
            Self::Mobile => "Mobile",
            Self::Tablet => "Tablet",
            Self::Bot => "Bot",
            Self::Other => "Other",
        }
    }

    pub fn classify(user_agent: &str) -> Self {
        let ua = user_agent.trim().to_ascii_lowercase();
        if ua.is_empty() {
            return Self::Other;
        }

        let has = |needle: &str| ua.contains(needle);

        if has("bot") || has("crawler") || has("spider") || has("headless") {
            Self::Bot
        } else if has("ipad")
            || has("tablet")
            || has("kindle")
            || has("silk")
            || (has("android") && !has("mobile"))
        {
            Self::Tablet
        } else if has("mobi") || has("iphone") || has("ipod") || has("windows phone") {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_browsers() {
        let chrome = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
        let firefox = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        assert_eq!(DeviceClass::classify(chrome), DeviceClass::Desktop);
        assert_eq!(DeviceClass::classify(firefox), DeviceClass::Desktop);
    }

    #[test]
    fn test_phones() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/120.0 Mobile Safari/537.36";
        assert_eq!(DeviceClass::classify(iphone), DeviceClass::Mobile);
        assert_eq!(DeviceClass::classify(android), DeviceClass::Mobile);
    }

    #[test]
    fn test_tablets() {
        let ipad = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
        let android_tablet = "Mozilla/5.0 (Linux; Android 13; SM-X200) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";
        assert_eq!(DeviceClass::classify(ipad), DeviceClass::Tablet);
        assert_eq!(DeviceClass::classify(android_tablet), DeviceClass::Tablet);
    }

    #[test]
    fn test_bots_and_empty() {
        let googlebot = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
        assert_eq!(DeviceClass::classify(googlebot), DeviceClass::Bot);
        assert_eq!(DeviceClass::classify(""), DeviceClass::Other);
        assert_eq!(DeviceClass::classify("   "), DeviceClass::Other);
    }
}

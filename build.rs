fn main() {
    #[cfg(target_os = "windows")]
    {
        let mut res = winres::WindowsResource::new();
        res.set("ProductName", "QeVR");
        res.set("FileDescription", "Vulnerability scan to SMS eVR converter");
        res.compile().expect("Failed to compile Windows resources");
    }
}

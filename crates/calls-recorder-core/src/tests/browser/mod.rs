mod cdp;
mod driver;
